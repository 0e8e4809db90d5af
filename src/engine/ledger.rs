// ==========================================
// MES 库存台账系统 - 库存事务台账引擎
// ==========================================
// 职责: 事务创建/审批/驳回 + 余额应用
// 红线: 余额变动发生且仅发生在事务变为 APPROVED 的那一刻
//       台账行插入与余额应用在同一 SQLite 事务内提交
// 红线: quantity 永远为非负数量,方向由事务类型决定
// ==========================================

use crate::domain::balance::BalanceKey;
use crate::domain::transaction::{InventoryTransaction, NewTransaction};
use crate::domain::types::{ApprovalStatus, TransactionType};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::repository::balance_repo::BalanceRepository;
use crate::repository::error::RepositoryError;
use crate::repository::transaction_repo::TransactionRepository;
use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

// ==========================================
// InventoryLedger - 库存事务台账
// ==========================================

/// 库存事务台账引擎
///
/// 所有移动先落台账行,再(在审批时刻)应用到余额。
/// 台账行只追加,审批字段一次性写入,驳回为终态。
pub struct InventoryLedger {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryLedger {
    /// 从已有连接创建台账引擎
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> LedgerResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))
    }

    // ==========================================
    // 对外接口
    // ==========================================

    /// 创建库存事务
    ///
    /// # 参数
    /// - req: 事务创建请求(quantity 必须非负)
    /// - auto_approve: true 时在同一事务内直接审批并应用余额
    ///
    /// # 返回
    /// 持久化后的事务实体
    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id, number = %req.transaction_number))]
    pub fn create(
        &self,
        req: NewTransaction,
        auto_approve: bool,
    ) -> LedgerResult<InventoryTransaction> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let transaction = Self::create_in_tx(&tx, req, auto_approve)?;

        tx.commit().map_err(RepositoryError::from)?;
        info!(
            transaction_id = %transaction.transaction_id,
            status = %transaction.approval_status,
            "库存事务已创建"
        );
        Ok(transaction)
    }

    /// 审批事务(PENDING -> APPROVED)
    ///
    /// 审批戳与余额应用在同一事务内提交;余额应用失败时审批状态一并回滚
    #[instrument(skip(self))]
    pub fn approve(
        &self,
        transaction_id: &str,
        approver: &str,
    ) -> LedgerResult<InventoryTransaction> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let transaction = Self::approve_in_tx(&tx, transaction_id, approver)?;

        tx.commit().map_err(RepositoryError::from)?;
        info!(transaction_id, approver, "库存事务已审批,余额已应用");
        Ok(transaction)
    }

    /// 驳回事务(PENDING -> REJECTED,终态)
    ///
    /// 驳回永不触碰余额
    #[instrument(skip(self, reason))]
    pub fn reject(
        &self,
        transaction_id: &str,
        approver: &str,
        reason: &str,
    ) -> LedgerResult<InventoryTransaction> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let mut transaction = TransactionRepository::find_by_id_tx(&tx, transaction_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "InventoryTransaction".to_string(),
                id: transaction_id.to_string(),
            })?;

        if transaction.approval_status != ApprovalStatus::Pending {
            return Err(LedgerError::InvalidStateTransition {
                from: transaction.approval_status.to_string(),
                to: ApprovalStatus::Rejected.to_string(),
            });
        }

        let now = Utc::now();
        TransactionRepository::update_approval_tx(
            &tx,
            transaction_id,
            ApprovalStatus::Rejected,
            approver,
            now,
            Some(reason),
        )?;

        tx.commit().map_err(RepositoryError::from)?;
        info!(transaction_id, approver, "库存事务已驳回");

        transaction.approval_status = ApprovalStatus::Rejected;
        transaction.approved_by = Some(approver.to_string());
        transaction.approved_at = Some(now);
        transaction.reject_reason = Some(reason.to_string());
        Ok(transaction)
    }

    /// 创建盘点调整事务(单号 ADJ-YYYYMMDD-NNNN 自动生成)
    ///
    /// ADJUST 语义为绝对覆盖: 审批后 available 直接覆盖为 new_quantity
    #[instrument(skip(self))]
    pub fn create_adjustment(
        &self,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
        lot_id: Option<&str>,
        new_quantity: f64,
        unit: &str,
        created_by: &str,
        auto_approve: bool,
    ) -> LedgerResult<InventoryTransaction> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let number =
            crate::engine::numbering::next_adjustment_number(&tx, tenant_id, Utc::now().date_naive())?;
        let req = NewTransaction {
            tenant_id: tenant_id.to_string(),
            transaction_number: number.clone(),
            transaction_type: TransactionType::Adjust,
            quantity: new_quantity,
            unit: unit.to_string(),
            warehouse_id: warehouse_id.to_string(),
            to_warehouse_id: None,
            product_id: product_id.to_string(),
            lot_id: lot_id.map(|s| s.to_string()),
            reference: Some(crate::domain::types::DocumentRef::Adjustment(number)),
            remarks: None,
            created_by: created_by.to_string(),
        };

        let transaction = Self::create_in_tx(&tx, req, auto_approve)?;
        tx.commit().map_err(RepositoryError::from)?;
        info!(transaction_id = %transaction.transaction_id, "盘点调整事务已创建");
        Ok(transaction)
    }

    /// 按 ID 查询事务
    pub fn find_by_id(&self, transaction_id: &str) -> LedgerResult<Option<InventoryTransaction>> {
        let conn = self.get_conn()?;
        Ok(TransactionRepository::find_by_id_tx(&conn, transaction_id)?)
    }

    // ==========================================
    // 事务内组合接口(供收货/发货工作流在其工作单元中调用)
    // ==========================================

    /// 在给定事务内创建库存事务
    pub(crate) fn create_in_tx(
        conn: &Connection,
        req: NewTransaction,
        auto_approve: bool,
    ) -> LedgerResult<InventoryTransaction> {
        if req.quantity < 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "事务数量必须非负: {}",
                req.quantity
            )));
        }
        if req.transaction_type == TransactionType::Move && req.to_warehouse_id.is_none() {
            return Err(LedgerError::InvalidInput(
                "移库事务缺少目的仓库".to_string(),
            ));
        }

        let now = Utc::now();
        let (approval_status, approved_by, approved_at) = if auto_approve {
            (
                ApprovalStatus::Approved,
                Some(req.created_by.clone()),
                Some(now),
            )
        } else {
            (ApprovalStatus::Pending, None, None)
        };

        let transaction = InventoryTransaction {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: req.tenant_id,
            transaction_number: req.transaction_number,
            transaction_type: req.transaction_type,
            quantity: req.quantity,
            unit: req.unit,
            warehouse_id: req.warehouse_id,
            to_warehouse_id: req.to_warehouse_id,
            product_id: req.product_id,
            lot_id: req.lot_id,
            approval_status,
            approved_by,
            approved_at,
            reject_reason: None,
            reference: req.reference,
            remarks: req.remarks,
            created_by: req.created_by,
            created_at: now,
        };

        TransactionRepository::insert_tx(conn, &transaction)?;

        if auto_approve {
            Self::apply_balance_tx(conn, &transaction)?;
        }

        Ok(transaction)
    }

    /// 在给定事务内审批并应用余额
    pub(crate) fn approve_in_tx(
        conn: &Connection,
        transaction_id: &str,
        approver: &str,
    ) -> LedgerResult<InventoryTransaction> {
        let mut transaction = TransactionRepository::find_by_id_tx(conn, transaction_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "InventoryTransaction".to_string(),
                id: transaction_id.to_string(),
            })?;

        if transaction.approval_status != ApprovalStatus::Pending {
            return Err(LedgerError::InvalidStateTransition {
                from: transaction.approval_status.to_string(),
                to: ApprovalStatus::Approved.to_string(),
            });
        }

        let now = Utc::now();
        TransactionRepository::update_approval_tx(
            conn,
            transaction_id,
            ApprovalStatus::Approved,
            approver,
            now,
            None,
        )?;

        transaction.approval_status = ApprovalStatus::Approved;
        transaction.approved_by = Some(approver.to_string());
        transaction.approved_at = Some(now);

        Self::apply_balance_tx(conn, &transaction)?;
        Ok(transaction)
    }

    // ==========================================
    // 余额应用(余额行唯一的业务写路径)
    // ==========================================

    /// 将已审批事务应用到余额(事务内)
    ///
    /// - 入库: available += quantity
    /// - 出库: 先扣 available,不足部分扣 reserved,总量不足报 InsufficientInventory
    /// - ADJUST: available 绝对覆盖为 quantity,reserved 不变
    /// - MOVE: 源仓出库 + 目的仓入库,同一事务内完成
    pub(crate) fn apply_balance_tx(
        conn: &Connection,
        t: &InventoryTransaction,
    ) -> LedgerResult<()> {
        let key = BalanceKey::new(
            &t.tenant_id,
            &t.warehouse_id,
            &t.product_id,
            t.lot_id.as_deref(),
        );

        if t.transaction_type.is_inbound() {
            let balance = BalanceRepository::get_or_create_tx(conn, &key, &t.unit)?;
            BalanceRepository::update_quantities_tx(
                conn,
                &balance.balance_id,
                balance.available_quantity + t.quantity,
                balance.reserved_quantity,
                Some(t.transaction_type),
            )?;
            return Ok(());
        }

        if t.transaction_type.is_outbound() {
            Self::drain_balance_tx(conn, &key, t.quantity, &t.unit, t.transaction_type)?;
            return Ok(());
        }

        match t.transaction_type {
            TransactionType::Adjust => {
                let balance = BalanceRepository::get_or_create_tx(conn, &key, &t.unit)?;
                BalanceRepository::update_quantities_tx(
                    conn,
                    &balance.balance_id,
                    t.quantity,
                    balance.reserved_quantity,
                    Some(TransactionType::Adjust),
                )?;
                Ok(())
            }
            TransactionType::Move => {
                let to_warehouse_id = t.to_warehouse_id.as_deref().ok_or_else(|| {
                    LedgerError::InvalidInput("移库事务缺少目的仓库".to_string())
                })?;

                // 源仓出库
                Self::drain_balance_tx(conn, &key, t.quantity, &t.unit, TransactionType::Move)?;

                // 目的仓入库
                let to_key = BalanceKey::new(
                    &t.tenant_id,
                    to_warehouse_id,
                    &t.product_id,
                    t.lot_id.as_deref(),
                );
                let to_balance = BalanceRepository::get_or_create_tx(conn, &to_key, &t.unit)?;
                BalanceRepository::update_quantities_tx(
                    conn,
                    &to_balance.balance_id,
                    to_balance.available_quantity + t.quantity,
                    to_balance.reserved_quantity,
                    Some(TransactionType::Move),
                )?;
                Ok(())
            }
            _ => unreachable!("入库/出库类型已在前面分支处理"),
        }
    }

    /// 出库扣减: 先扣 available,不足部分扣 reserved
    fn drain_balance_tx(
        conn: &Connection,
        key: &BalanceKey,
        quantity: f64,
        unit: &str,
        transaction_type: TransactionType,
    ) -> LedgerResult<()> {
        let balance = BalanceRepository::get_or_create_tx(conn, key, unit)?;

        let on_hand = balance.on_hand();
        if on_hand < quantity {
            return Err(LedgerError::InsufficientInventory {
                requested: quantity,
                available: on_hand,
            });
        }

        let from_available = balance.available_quantity.min(quantity);
        let from_reserved = quantity - from_available;

        BalanceRepository::update_quantities_tx(
            conn,
            &balance.balance_id,
            balance.available_quantity - from_available,
            balance.reserved_quantity - from_reserved,
            Some(transaction_type),
        )?;
        Ok(())
    }
}
