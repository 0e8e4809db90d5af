// ==========================================
// MES 库存台账系统 - 仓库数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 隔离仓由租户配置显式指定,本仓储只负责按 ID/类型取数
// ==========================================

use crate::domain::types::WarehouseType;
use crate::domain::warehouse::Warehouse;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// WarehouseRepository - 仓库仓储
// ==========================================

/// 仓库仓储
/// 职责: 管理 warehouse 表(边界协作方的本地视图)
pub struct WarehouseRepository {
    conn: Arc<Mutex<Connection>>,
}

const WAREHOUSE_COLUMNS: &str =
    "warehouse_id, tenant_id, code, name, warehouse_type, is_active, created_at";

fn map_warehouse(row: &Row<'_>) -> SqliteResult<Warehouse> {
    Ok(Warehouse {
        warehouse_id: row.get(0)?,
        tenant_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        warehouse_type: WarehouseType::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(WarehouseType::Normal),
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl WarehouseRepository {
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

    /// 插入仓库
    pub fn insert(&self, warehouse: &Warehouse) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO warehouse ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                WAREHOUSE_COLUMNS
            ),
            params![
                warehouse.warehouse_id,
                warehouse.tenant_id,
                warehouse.code,
                warehouse.name,
                warehouse.warehouse_type.to_db_str(),
                warehouse.is_active,
                warehouse.created_at,
            ],
        )?;
        Ok(())
    }

    /// 按 ID 查询仓库(事务内)
    pub fn find_by_id_tx(
        conn: &Connection,
        warehouse_id: &str,
    ) -> RepositoryResult<Option<Warehouse>> {
        let w = conn
            .query_row(
                &format!(
                    "SELECT {} FROM warehouse WHERE warehouse_id = ?1",
                    WAREHOUSE_COLUMNS
                ),
                params![warehouse_id],
                map_warehouse,
            )
            .optional()?;
        Ok(w)
    }

    /// 按 ID 查询仓库
    pub fn find_by_id(&self, warehouse_id: &str) -> RepositoryResult<Option<Warehouse>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, warehouse_id)
    }

    /// 按租户和类型查询活动仓库列表
    pub fn find_by_type(
        &self,
        tenant_id: &str,
        warehouse_type: WarehouseType,
    ) -> RepositoryResult<Vec<Warehouse>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM warehouse \
             WHERE tenant_id = ?1 AND warehouse_type = ?2 AND is_active = 1 \
             ORDER BY code",
            WAREHOUSE_COLUMNS
        ))?;
        let list = stmt
            .query_map(
                params![tenant_id, warehouse_type.to_db_str()],
                map_warehouse,
            )?
            .collect::<SqliteResult<Vec<Warehouse>>>()?;
        Ok(list)
    }
}
