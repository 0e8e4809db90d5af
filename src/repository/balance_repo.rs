// ==========================================
// MES 库存台账系统 - 库存余额数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 余额行惰性创建,从不删除,只清零
// ==========================================

use crate::domain::balance::{BalanceKey, InventoryBalance};
use crate::domain::types::TransactionType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// AllocationCandidate - 分配候选行
// ==========================================
// 余额 ⋈ 批次,供批次分配引擎排序与贪心填充
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationCandidate {
    pub lot_id: String,
    pub lot_number: String,
    pub available_quantity: f64,
    pub expiry_date: Option<NaiveDate>,
    pub lot_created_at: DateTime<Utc>,
}

// ==========================================
// BalanceRepository - 库存余额仓储
// ==========================================

/// 库存余额仓储
/// 职责: 管理 inventory_balance 表的读写;数量语义由引擎层负责
pub struct BalanceRepository {
    conn: Arc<Mutex<Connection>>,
}

const BALANCE_COLUMNS: &str = "balance_id, tenant_id, warehouse_id, product_id, lot_id, \
     available_quantity, reserved_quantity, unit, \
     last_transaction_date, last_transaction_type, created_at, updated_at";

fn map_balance(row: &Row<'_>) -> SqliteResult<InventoryBalance> {
    Ok(InventoryBalance {
        balance_id: row.get(0)?,
        tenant_id: row.get(1)?,
        warehouse_id: row.get(2)?,
        product_id: row.get(3)?,
        lot_id: row.get(4)?,
        available_quantity: row.get(5)?,
        reserved_quantity: row.get(6)?,
        unit: row.get(7)?,
        last_transaction_date: row.get(8)?,
        last_transaction_type: row
            .get::<_, Option<String>>(9)?
            .and_then(|s| TransactionType::from_str(&s)),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl BalanceRepository {
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

    /// 按余额键查询(事务内)
    pub fn find_by_key_tx(
        conn: &Connection,
        key: &BalanceKey,
    ) -> RepositoryResult<Option<InventoryBalance>> {
        let balance = conn
            .query_row(
                &format!(
                    "SELECT {} FROM inventory_balance \
                     WHERE tenant_id = ?1 AND warehouse_id = ?2 AND product_id = ?3 \
                       AND COALESCE(lot_id, '') = COALESCE(?4, '')",
                    BALANCE_COLUMNS
                ),
                params![key.tenant_id, key.warehouse_id, key.product_id, key.lot_id],
                map_balance,
            )
            .optional()?;
        Ok(balance)
    }

    /// 查询或惰性创建余额行(事务内)
    ///
    /// 余额行在首次移动触及该键时创建,初始数量为 0
    pub fn get_or_create_tx(
        conn: &Connection,
        key: &BalanceKey,
        unit: &str,
    ) -> RepositoryResult<InventoryBalance> {
        if let Some(balance) = Self::find_by_key_tx(conn, key)? {
            return Ok(balance);
        }

        let now = Utc::now();
        let balance = InventoryBalance {
            balance_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: key.tenant_id.clone(),
            warehouse_id: key.warehouse_id.clone(),
            product_id: key.product_id.clone(),
            lot_id: key.lot_id.clone(),
            available_quantity: 0.0,
            reserved_quantity: 0.0,
            unit: unit.to_string(),
            last_transaction_date: None,
            last_transaction_type: None,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            &format!(
                "INSERT INTO inventory_balance ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                BALANCE_COLUMNS
            ),
            params![
                balance.balance_id,
                balance.tenant_id,
                balance.warehouse_id,
                balance.product_id,
                balance.lot_id,
                balance.available_quantity,
                balance.reserved_quantity,
                balance.unit,
                balance.last_transaction_date,
                Option::<String>::None,
                balance.created_at,
                balance.updated_at,
            ],
        )?;

        Ok(balance)
    }

    /// 覆写余额行数量并盖上最后事务戳(事务内)
    ///
    /// 这是余额行唯一的数量写路径;available/reserved 为计算后的目标值
    pub fn update_quantities_tx(
        conn: &Connection,
        balance_id: &str,
        available_quantity: f64,
        reserved_quantity: f64,
        transaction_type: Option<TransactionType>,
    ) -> RepositoryResult<()> {
        let now = Utc::now();
        let affected = conn.execute(
            "UPDATE inventory_balance \
             SET available_quantity = ?1, reserved_quantity = ?2, \
                 last_transaction_date = ?3, last_transaction_type = ?4, updated_at = ?5 \
             WHERE balance_id = ?6",
            params![
                available_quantity,
                reserved_quantity,
                now,
                transaction_type.map(|t| t.to_db_str()),
                now,
                balance_id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "InventoryBalance".to_string(),
                id: balance_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 (仓库, 产品) 汇总可用数量(事务内)
    pub fn sum_available_tx(
        conn: &Connection,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
    ) -> RepositoryResult<f64> {
        let sum: f64 = conn.query_row(
            "SELECT COALESCE(SUM(available_quantity), 0) FROM inventory_balance \
             WHERE tenant_id = ?1 AND warehouse_id = ?2 AND product_id = ?3",
            params![tenant_id, warehouse_id, product_id],
            |row| row.get(0),
        )?;
        Ok(sum)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按余额键查询
    pub fn find_by_key(&self, key: &BalanceKey) -> RepositoryResult<Option<InventoryBalance>> {
        let conn = self.get_conn()?;
        Self::find_by_key_tx(&conn, key)
    }

    /// 查询 (仓库, 产品) 下所有余额行(含各批次)
    pub fn find_by_product(
        &self,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
    ) -> RepositoryResult<Vec<InventoryBalance>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM inventory_balance \
             WHERE tenant_id = ?1 AND warehouse_id = ?2 AND product_id = ?3 \
             ORDER BY created_at",
            BALANCE_COLUMNS
        ))?;
        let balances = stmt
            .query_map(params![tenant_id, warehouse_id, product_id], map_balance)?
            .collect::<SqliteResult<Vec<InventoryBalance>>>()?;
        Ok(balances)
    }

    /// 按 (仓库, 产品) 汇总可用数量
    pub fn sum_available(
        &self,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
    ) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        Self::sum_available_tx(&conn, tenant_id, warehouse_id, product_id)
    }

    /// 查询分配候选行(余额 ⋈ 批次)
    ///
    /// 条件: available_quantity > 0 且批次活动
    /// 排序交由分配引擎按策略决定,此处按创建时间升序返回保证确定性
    pub fn find_allocation_candidates(
        &self,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
    ) -> RepositoryResult<Vec<AllocationCandidate>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT b.lot_id, l.lot_number, b.available_quantity, l.expiry_date, l.created_at \
             FROM inventory_balance b \
             JOIN lot l ON l.lot_id = b.lot_id \
             WHERE b.tenant_id = ?1 AND b.warehouse_id = ?2 AND b.product_id = ?3 \
               AND b.available_quantity > 0 AND l.is_active = 1 \
             ORDER BY l.created_at, l.lot_number",
        )?;
        let candidates = stmt
            .query_map(params![tenant_id, warehouse_id, product_id], |row| {
                Ok(AllocationCandidate {
                    lot_id: row.get(0)?,
                    lot_number: row.get(1)?,
                    available_quantity: row.get(2)?,
                    expiry_date: row.get(3)?,
                    lot_created_at: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<AllocationCandidate>>>()?;
        Ok(candidates)
    }
}
