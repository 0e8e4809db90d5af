// ==========================================
// MES 库存台账系统 - 质检边界数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 质检服务是外部协作方,此处只维护检验标准与检验申请的边界视图
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// InspectionStandard - 检验标准(边界视图)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionStandard {
    pub standard_id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub kind: String, // INCOMING(IQC) / OUTGOING(OQC)
    pub name: String,
    pub is_active: bool,
}

// ==========================================
// InspectionRequest - 检验申请(边界视图)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionRequest {
    pub request_id: String,
    pub tenant_id: String,
    pub standard_id: String,
    pub product_id: String,
    pub quantity: f64,
    pub status: String, // PENDING / PASS / FAIL(由质检服务回写)
    pub created_at: DateTime<Utc>,
}

// ==========================================
// InspectionRepository - 质检边界仓储
// ==========================================

pub struct InspectionRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_standard(row: &Row<'_>) -> rusqlite::Result<InspectionStandard> {
    Ok(InspectionStandard {
        standard_id: row.get(0)?,
        tenant_id: row.get(1)?,
        product_id: row.get(2)?,
        kind: row.get(3)?,
        name: row.get(4)?,
        is_active: row.get(5)?,
    })
}

impl InspectionRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入检验标准
    pub fn insert_standard(&self, standard: &InspectionStandard) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO inspection_standard \
             (standard_id, tenant_id, product_id, kind, name, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                standard.standard_id,
                standard.tenant_id,
                standard.product_id,
                standard.kind,
                standard.name,
                standard.is_active,
            ],
        )?;
        Ok(())
    }

    /// 查询产品的活动检验标准(事务内)
    pub fn find_active_standard_tx(
        conn: &Connection,
        tenant_id: &str,
        product_id: &str,
        kind: &str,
    ) -> RepositoryResult<Option<InspectionStandard>> {
        let standard = conn
            .query_row(
                "SELECT standard_id, tenant_id, product_id, kind, name, is_active \
                 FROM inspection_standard \
                 WHERE tenant_id = ?1 AND product_id = ?2 AND kind = ?3 AND is_active = 1",
                params![tenant_id, product_id, kind],
                map_standard,
            )
            .optional()?;
        Ok(standard)
    }

    /// 创建检验申请(事务内)
    pub fn insert_request_tx(
        conn: &Connection,
        request: &InspectionRequest,
    ) -> RepositoryResult<()> {
        conn.execute(
            "INSERT INTO inspection_request \
             (request_id, tenant_id, standard_id, product_id, quantity, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                request.request_id,
                request.tenant_id,
                request.standard_id,
                request.product_id,
                request.quantity,
                request.status,
                request.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按 ID 查询检验申请
    pub fn find_request(&self, request_id: &str) -> RepositoryResult<Option<InspectionRequest>> {
        let conn = self.get_conn()?;
        let request = conn
            .query_row(
                "SELECT request_id, tenant_id, standard_id, product_id, quantity, status, created_at \
                 FROM inspection_request WHERE request_id = ?1",
                params![request_id],
                |row| {
                    Ok(InspectionRequest {
                        request_id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        standard_id: row.get(2)?,
                        product_id: row.get(3)?,
                        quantity: row.get(4)?,
                        status: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(request)
    }
}
