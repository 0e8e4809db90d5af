// ==========================================
// MES 库存台账系统 - 库存预留接口
// ==========================================
// 职责: available <-> reserved 的双向搬运
// 红线: 预留/释放不产生台账行,只在余额行内部搬运
//       在手总量(available + reserved)保持不变
// ==========================================

use crate::domain::balance::{BalanceKey, InventoryBalance};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::repository::balance_repo::BalanceRepository;
use crate::repository::error::RepositoryError;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

// ==========================================
// ReservationApi - 库存预留接口
// ==========================================

pub struct ReservationApi {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationApi {
    /// 从已有连接创建预留接口
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> LedgerResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))
    }

    /// 预留库存: available -> reserved
    ///
    /// # 返回
    /// 更新后的余额行;available < quantity 时返回 InsufficientInventory
    #[instrument(skip(self))]
    pub fn reserve(
        &self,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
        lot_id: Option<&str>,
        quantity: f64,
    ) -> LedgerResult<InventoryBalance> {
        if quantity <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "预留数量必须大于 0: {}",
                quantity
            )));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let key = BalanceKey::new(tenant_id, warehouse_id, product_id, lot_id);
        let balance = BalanceRepository::find_by_key_tx(&tx, &key)?;

        let Some(balance) = balance else {
            return Err(LedgerError::InsufficientInventory {
                requested: quantity,
                available: 0.0,
            });
        };

        if balance.available_quantity < quantity {
            return Err(LedgerError::InsufficientInventory {
                requested: quantity,
                available: balance.available_quantity,
            });
        }

        // 预留不改写最后事务戳(不是库存移动)
        BalanceRepository::update_quantities_tx(
            &tx,
            &balance.balance_id,
            balance.available_quantity - quantity,
            balance.reserved_quantity + quantity,
            balance.last_transaction_type,
        )?;

        tx.commit().map_err(RepositoryError::from)?;
        info!(balance_id = %balance.balance_id, quantity, "库存已预留");

        let updated = InventoryBalance {
            available_quantity: balance.available_quantity - quantity,
            reserved_quantity: balance.reserved_quantity + quantity,
            ..balance
        };
        Ok(updated)
    }

    /// 释放预留: reserved -> available
    ///
    /// # 返回
    /// 更新后的余额行;reserved < quantity 时返回 InsufficientInventory
    #[instrument(skip(self))]
    pub fn release(
        &self,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
        lot_id: Option<&str>,
        quantity: f64,
    ) -> LedgerResult<InventoryBalance> {
        if quantity <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "释放数量必须大于 0: {}",
                quantity
            )));
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let key = BalanceKey::new(tenant_id, warehouse_id, product_id, lot_id);
        let balance = BalanceRepository::find_by_key_tx(&tx, &key)?.ok_or_else(|| {
            LedgerError::NotFound {
                entity: "InventoryBalance".to_string(),
                id: format!("{}/{}/{}", warehouse_id, product_id, lot_id.unwrap_or("-")),
            }
        })?;

        if balance.reserved_quantity < quantity {
            return Err(LedgerError::InsufficientInventory {
                requested: quantity,
                available: balance.reserved_quantity,
            });
        }

        BalanceRepository::update_quantities_tx(
            &tx,
            &balance.balance_id,
            balance.available_quantity + quantity,
            balance.reserved_quantity - quantity,
            balance.last_transaction_type,
        )?;

        tx.commit().map_err(RepositoryError::from)?;
        info!(balance_id = %balance.balance_id, quantity, "预留已释放");

        let updated = InventoryBalance {
            available_quantity: balance.available_quantity + quantity,
            reserved_quantity: balance.reserved_quantity - quantity,
            ..balance
        };
        Ok(updated)
    }
}
