// ==========================================
// MES 库存台账系统 - 库存事务数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: (tenant_id, transaction_number) 唯一,重复创建在此被拒绝
// ==========================================

use crate::domain::transaction::InventoryTransaction;
use crate::domain::types::{ApprovalStatus, DocumentRef, TransactionType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// TransactionRepository - 库存事务仓储
// ==========================================

/// 库存事务仓储
/// 职责: 管理 inventory_transaction 表的读写
pub struct TransactionRepository {
    conn: Arc<Mutex<Connection>>,
}

const TRANSACTION_COLUMNS: &str = "transaction_id, tenant_id, transaction_number, \
     transaction_type, quantity, unit, warehouse_id, to_warehouse_id, product_id, lot_id, \
     approval_status, approved_by, approved_at, reject_reason, reference, remarks, \
     created_by, created_at";

fn map_transaction(row: &Row<'_>) -> SqliteResult<InventoryTransaction> {
    Ok(InventoryTransaction {
        transaction_id: row.get(0)?,
        tenant_id: row.get(1)?,
        transaction_number: row.get(2)?,
        transaction_type: TransactionType::from_str(&row.get::<_, String>(3)?)
            .unwrap_or(TransactionType::Adjust),
        quantity: row.get(4)?,
        unit: row.get(5)?,
        warehouse_id: row.get(6)?,
        to_warehouse_id: row.get(7)?,
        product_id: row.get(8)?,
        lot_id: row.get(9)?,
        approval_status: ApprovalStatus::from_str(&row.get::<_, String>(10)?)
            .unwrap_or(ApprovalStatus::Pending),
        approved_by: row.get(11)?,
        approved_at: row.get(12)?,
        reject_reason: row.get(13)?,
        reference: row
            .get::<_, Option<String>>(14)?
            .and_then(|s| DocumentRef::from_db_str(&s)),
        remarks: row.get(15)?,
        created_by: row.get(16)?,
        created_at: row.get(17)?,
    })
}

impl TransactionRepository {
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

    // ==========================================
    // 事务内读写(由引擎在统一工作单元中调用)
    // ==========================================

    /// 插入事务行(事务内)
    ///
    /// 租户内事务号重复由唯一索引拒绝 -> UniqueConstraintViolation
    pub fn insert_tx(conn: &Connection, t: &InventoryTransaction) -> RepositoryResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO inventory_transaction ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                TRANSACTION_COLUMNS
            ),
            params![
                t.transaction_id,
                t.tenant_id,
                t.transaction_number,
                t.transaction_type.to_db_str(),
                t.quantity,
                t.unit,
                t.warehouse_id,
                t.to_warehouse_id,
                t.product_id,
                t.lot_id,
                t.approval_status.to_db_str(),
                t.approved_by,
                t.approved_at,
                t.reject_reason,
                t.reference.as_ref().map(|r| r.to_db_str()),
                t.remarks,
                t.created_by,
                t.created_at,
            ],
        )?;
        Ok(())
    }

    /// 更新审批结果(事务内)
    pub fn update_approval_tx(
        conn: &Connection,
        transaction_id: &str,
        status: ApprovalStatus,
        approved_by: &str,
        approved_at: DateTime<Utc>,
        reject_reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE inventory_transaction \
             SET approval_status = ?1, approved_by = ?2, approved_at = ?3, reject_reason = ?4 \
             WHERE transaction_id = ?5",
            params![
                status.to_db_str(),
                approved_by,
                approved_at,
                reject_reason,
                transaction_id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "InventoryTransaction".to_string(),
                id: transaction_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 ID 查询(事务内)
    pub fn find_by_id_tx(
        conn: &Connection,
        transaction_id: &str,
    ) -> RepositoryResult<Option<InventoryTransaction>> {
        let t = conn
            .query_row(
                &format!(
                    "SELECT {} FROM inventory_transaction WHERE transaction_id = ?1",
                    TRANSACTION_COLUMNS
                ),
                params![transaction_id],
                map_transaction,
            )
            .optional()?;
        Ok(t)
    }

    /// 按前缀统计事务数(事务内,用于单据内序号生成)
    pub fn count_by_prefix_tx(
        conn: &Connection,
        tenant_id: &str,
        prefix: &str,
    ) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM inventory_transaction \
             WHERE tenant_id = ?1 AND transaction_number LIKE ?2 || '%'",
            params![tenant_id, prefix],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按 ID 查询事务
    pub fn find_by_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<InventoryTransaction>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, transaction_id)
    }

    /// 按租户和事务号查询
    pub fn find_by_number(
        &self,
        tenant_id: &str,
        transaction_number: &str,
    ) -> RepositoryResult<Option<InventoryTransaction>> {
        let conn = self.get_conn()?;
        let t = conn
            .query_row(
                &format!(
                    "SELECT {} FROM inventory_transaction \
                     WHERE tenant_id = ?1 AND transaction_number = ?2",
                    TRANSACTION_COLUMNS
                ),
                params![tenant_id, transaction_number],
                map_transaction,
            )
            .optional()?;
        Ok(t)
    }

    /// 查询单据引用下的全部事务
    pub fn find_by_reference(
        &self,
        tenant_id: &str,
        reference: &DocumentRef,
    ) -> RepositoryResult<Vec<InventoryTransaction>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM inventory_transaction \
             WHERE tenant_id = ?1 AND reference = ?2 \
             ORDER BY created_at",
            TRANSACTION_COLUMNS
        ))?;
        let list = stmt
            .query_map(params![tenant_id, reference.to_db_str()], map_transaction)?
            .collect::<SqliteResult<Vec<InventoryTransaction>>>()?;
        Ok(list)
    }
}
