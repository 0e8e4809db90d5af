// ==========================================
// MES 库存台账系统 - 收货工作流
// ==========================================
// 状态机: PENDING -> INSPECTING -> COMPLETED
//         已取消(CANCELLED)之外的状态均可取消
// 红线: 免检行在创建时即入账(auto-approve);
//       待检行创建 PENDING 事务,余额不动,完成时刻一次性解析
// 红线: 存在不合格行且租户未配置隔离仓时,完成收货被显式拒绝
// ==========================================

use crate::config::tenant_config::{TenantConfigManager, KEY_QUARANTINE_WAREHOUSE};
use crate::domain::receipt::{GoodsReceipt, GoodsReceiptItem, NewReceipt};
use crate::domain::transaction::NewTransaction;
use crate::domain::types::{DocumentRef, InspectionStatus, QualityStatus, ReceiptStatus, TransactionType};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::engine::ledger::InventoryLedger;
use crate::engine::numbering;
use crate::repository::error::RepositoryError;
use crate::repository::inspection_repo::{InspectionRepository, InspectionRequest};
use crate::repository::lot_repo::LotRepository;
use crate::repository::receipt_repo::ReceiptRepository;
use crate::repository::transaction_repo::TransactionRepository;
use crate::repository::warehouse_repo::WarehouseRepository;
use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// 来料检验标准种类
const INSPECTION_KIND_INCOMING: &str = "INCOMING";

// ==========================================
// ReceivingWorkflow - 收货工作流
// ==========================================

pub struct ReceivingWorkflow {
    conn: Arc<Mutex<Connection>>,
    receipt_repo: ReceiptRepository,
}

impl ReceivingWorkflow {
    /// 从已有连接创建收货工作流
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            receipt_repo: ReceiptRepository::from_connection(conn.clone()),
            conn,
        }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> LedgerResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LedgerError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))
    }

    // ==========================================
    // 创建收货单
    // ==========================================

    /// 创建收货单(单头 + 行项目 + 批次 + 库存事务,一个工作单元)
    ///
    /// # 行为
    /// - 单号缺省时生成 GR-YYYYMMDD-NNNN,重号被唯一索引拒绝
    /// - 每行复用或创建批次;检验要求决定批次初始质量状态
    /// - 免检行: auto-approve 的 IN_RECEIVE 事务,available 立即入账
    /// - 待检行: PENDING 的 IN_RECEIVE 事务,余额不动,并开检验申请
    ///   (产品无活动来料检验标准时告警跳过)
    /// - 任一行待检 -> 单头 INSPECTING,否则 PENDING
    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    pub fn create_receipt(
        &self,
        req: NewReceipt,
    ) -> LedgerResult<(GoodsReceipt, Vec<GoodsReceiptItem>)> {
        if req.items.is_empty() {
            return Err(LedgerError::InvalidInput("收货单至少需要一行".to_string()));
        }
        for (idx, item) in req.items.iter().enumerate() {
            if item.quantity <= 0.0 {
                return Err(LedgerError::InvalidInput(format!(
                    "第{}行收货数量必须大于 0: {}",
                    idx + 1,
                    item.quantity
                )));
            }
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let receipt_number = match req.receipt_number {
            Some(number) => number,
            None => numbering::next_receipt_number(&tx, &req.tenant_id, req.receipt_date)?,
        };

        // 合计与单头状态可从请求直接推出
        let total_quantity: f64 = req.items.iter().map(|i| i.quantity).sum();
        let total_amount: f64 = req.items.iter().map(|i| i.quantity * i.unit_price).sum();
        let any_inspection = req
            .items
            .iter()
            .any(|i| i.inspection_status == Some(InspectionStatus::Pending));
        let status = if any_inspection {
            ReceiptStatus::Inspecting
        } else {
            ReceiptStatus::Pending
        };

        let now = Utc::now();
        let header = GoodsReceipt {
            receipt_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: req.tenant_id.clone(),
            receipt_number: receipt_number.clone(),
            supplier_name: req.supplier_name.clone(),
            status,
            receipt_date: req.receipt_date,
            total_quantity,
            total_amount,
            remarks: req.remarks,
            created_by: req.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        ReceiptRepository::insert_header_tx(&tx, &header)?;

        let mut items = Vec::with_capacity(req.items.len());
        for (idx, new_item) in req.items.into_iter().enumerate() {
            let line_no = (idx + 1) as i32;
            let inspection_status = new_item
                .inspection_status
                .unwrap_or(InspectionStatus::NotRequired);
            let needs_inspection = inspection_status == InspectionStatus::Pending;

            // 批次复用或创建;批次当前数量在收货时刻即增加(实物已到),
            // 余额入账与否由审批门控
            let lot_number = new_item
                .lot_number
                .clone()
                .unwrap_or_else(|| format!("LOT-{}-{:03}", receipt_number, line_no));
            let lot_id = match LotRepository::find_by_number_tx(&tx, &req.tenant_id, &lot_number)? {
                Some(existing) => {
                    if existing.product_id != new_item.product_id {
                        return Err(LedgerError::InvalidInput(format!(
                            "批次{}已存在且属于其他产品: {}",
                            lot_number, existing.product_id
                        )));
                    }
                    LotRepository::adjust_current_quantity_tx(
                        &tx,
                        &existing.lot_id,
                        new_item.quantity,
                    )?;
                    // 复用批次吸收待检数量时整批退回待检,完成时刻统一解析
                    if needs_inspection && existing.quality_status != QualityStatus::Pending {
                        LotRepository::update_quality_status_tx(
                            &tx,
                            &existing.lot_id,
                            QualityStatus::Pending,
                        )?;
                    }
                    existing.lot_id
                }
                None => {
                    let quality = if needs_inspection {
                        QualityStatus::Pending
                    } else {
                        QualityStatus::Passed
                    };
                    let mut lot = crate::domain::lot::Lot::new(
                        &req.tenant_id,
                        &lot_number,
                        &new_item.product_id,
                        new_item.quantity,
                        &new_item.unit,
                        quality,
                    );
                    lot.supplier_name = req.supplier_name.clone();
                    lot.expiry_date = new_item.expiry_date;
                    LotRepository::insert_tx(&tx, &lot)?;
                    lot.lot_id
                }
            };

            // 检验申请(有活动标准才开;无标准时告警跳过,行保持待检)
            let inspection_request_id = if needs_inspection {
                match InspectionRepository::find_active_standard_tx(
                    &tx,
                    &req.tenant_id,
                    &new_item.product_id,
                    INSPECTION_KIND_INCOMING,
                )? {
                    Some(standard) => {
                        let request = InspectionRequest {
                            request_id: uuid::Uuid::new_v4().to_string(),
                            tenant_id: req.tenant_id.clone(),
                            standard_id: standard.standard_id,
                            product_id: new_item.product_id.clone(),
                            quantity: new_item.quantity,
                            status: "PENDING".to_string(),
                            created_at: now,
                        };
                        InspectionRepository::insert_request_tx(&tx, &request)?;
                        Some(request.request_id)
                    }
                    None => {
                        warn!(
                            product_id = %new_item.product_id,
                            "产品无活动来料检验标准,跳过检验申请"
                        );
                        None
                    }
                }
            } else {
                None
            };

            // 行级 IN_RECEIVE 事务;免检行直接审批入账
            let transaction_number =
                numbering::next_inbound_transaction_number(&tx, &req.tenant_id, &receipt_number)?;
            let transaction = InventoryLedger::create_in_tx(
                &tx,
                NewTransaction {
                    tenant_id: req.tenant_id.clone(),
                    transaction_number,
                    transaction_type: TransactionType::InReceive,
                    quantity: new_item.quantity,
                    unit: new_item.unit.clone(),
                    warehouse_id: new_item.warehouse_id.clone(),
                    to_warehouse_id: None,
                    product_id: new_item.product_id.clone(),
                    lot_id: Some(lot_id.clone()),
                    reference: Some(DocumentRef::Receipt(header.receipt_id.clone())),
                    remarks: None,
                    created_by: req.created_by.clone(),
                },
                !needs_inspection,
            )?;

            let item = GoodsReceiptItem {
                item_id: uuid::Uuid::new_v4().to_string(),
                receipt_id: header.receipt_id.clone(),
                line_no,
                product_id: new_item.product_id,
                warehouse_id: new_item.warehouse_id,
                quantity: new_item.quantity,
                unit: new_item.unit,
                unit_price: new_item.unit_price,
                amount: new_item.quantity * new_item.unit_price,
                lot_number: Some(lot_number),
                lot_id: Some(lot_id),
                inspection_status,
                inspection_request_id,
                transaction_id: Some(transaction.transaction_id),
            };
            ReceiptRepository::insert_item_tx(&tx, &item)?;
            items.push(item);
        }

        tx.commit().map_err(RepositoryError::from)?;
        info!(
            receipt_id = %header.receipt_id,
            receipt_number = %header.receipt_number,
            status = %header.status,
            item_count = items.len(),
            "收货单已创建"
        );
        Ok((header, items))
    }

    // ==========================================
    // 完成收货
    // ==========================================

    /// 完成收货(检验解析时刻)
    ///
    /// # 守卫
    /// - 任一行仍为 PENDING -> InspectionNotCompleted
    /// - 存在 FAIL 行但租户未配置隔离仓 -> QuarantineNotConfigured
    ///
    /// # 行为
    /// - PASS / 免检行: 批次置 PASSED,待审批事务审批入账
    /// - FAIL 行: 批次置 FAILED,原待审批事务驳回,
    ///   等量入账改道租户配置的隔离仓
    /// - 单头 -> COMPLETED
    #[instrument(skip(self))]
    pub fn complete_receipt(
        &self,
        receipt_id: &str,
        completed_by: &str,
    ) -> LedgerResult<GoodsReceipt> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let (mut header, items) = ReceiptRepository::find_by_id_tx(&tx, receipt_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "GoodsReceipt".to_string(),
                id: receipt_id.to_string(),
            })?;

        if !matches!(
            header.status,
            ReceiptStatus::Pending | ReceiptStatus::Inspecting
        ) {
            return Err(LedgerError::InvalidStateTransition {
                from: header.status.to_string(),
                to: ReceiptStatus::Completed.to_string(),
            });
        }

        // 门禁 1: 检验未完成
        let pending_lines: Vec<i32> = items
            .iter()
            .filter(|i| i.inspection_status == InspectionStatus::Pending)
            .map(|i| i.line_no)
            .collect();
        if !pending_lines.is_empty() {
            return Err(LedgerError::InspectionNotCompleted(format!(
                "收货单{}存在待检行: {:?}",
                header.receipt_number, pending_lines
            )));
        }

        // 门禁 2: 存在不合格行时必须已配置隔离仓
        let has_failed = items
            .iter()
            .any(|i| i.inspection_status == InspectionStatus::Fail);
        let quarantine_warehouse_id = if has_failed {
            let id = TenantConfigManager::get_tx(&tx, &header.tenant_id, KEY_QUARANTINE_WAREHOUSE)?
                .ok_or_else(|| {
                    LedgerError::QuarantineNotConfigured(format!(
                        "收货单{}存在不合格行,但租户{}未配置{}",
                        header.receipt_number, header.tenant_id, KEY_QUARANTINE_WAREHOUSE
                    ))
                })?;
            // 配置指向的仓库必须真实存在且处于活动状态
            match WarehouseRepository::find_by_id_tx(&tx, &id)? {
                Some(w) if w.is_active => {}
                _ => {
                    return Err(LedgerError::QuarantineNotConfigured(format!(
                        "租户{}配置的隔离仓{}不存在或已停用",
                        header.tenant_id, id
                    )));
                }
            }
            Some(id)
        } else {
            None
        };

        for item in &items {
            match item.inspection_status {
                InspectionStatus::Pass | InspectionStatus::NotRequired => {
                    if let Some(ref lot_id) = item.lot_id {
                        LotRepository::update_quality_status_tx(&tx, lot_id, QualityStatus::Passed)?;
                    }
                    // 免检行在创建时已审批;只审批仍挂起的事务
                    if let Some(ref transaction_id) = item.transaction_id {
                        let t = TransactionRepository::find_by_id_tx(&tx, transaction_id)?;
                        if let Some(t) = t {
                            if t.approval_status
                                == crate::domain::types::ApprovalStatus::Pending
                            {
                                InventoryLedger::approve_in_tx(&tx, transaction_id, completed_by)?;
                            }
                        }
                    }
                }
                InspectionStatus::Fail => {
                    if let Some(ref lot_id) = item.lot_id {
                        LotRepository::update_quality_status_tx(&tx, lot_id, QualityStatus::Failed)?;
                    }
                    // 原事务驳回(余额从未入账),等量入账改道隔离仓
                    if let Some(ref transaction_id) = item.transaction_id {
                        TransactionRepository::update_approval_tx(
                            &tx,
                            transaction_id,
                            crate::domain::types::ApprovalStatus::Rejected,
                            completed_by,
                            Utc::now(),
                            Some("检验不合格,改道隔离仓"),
                        )?;
                    }
                    let quarantine_id =
                        quarantine_warehouse_id.as_deref().ok_or_else(|| {
                            LedgerError::InternalError("隔离仓配置缺失".to_string())
                        })?;
                    let transaction_number = numbering::next_inbound_transaction_number(
                        &tx,
                        &header.tenant_id,
                        &header.receipt_number,
                    )?;
                    let quarantine_transaction = InventoryLedger::create_in_tx(
                        &tx,
                        NewTransaction {
                            tenant_id: header.tenant_id.clone(),
                            transaction_number,
                            transaction_type: TransactionType::InReceive,
                            quantity: item.quantity,
                            unit: item.unit.clone(),
                            warehouse_id: quarantine_id.to_string(),
                            to_warehouse_id: None,
                            product_id: item.product_id.clone(),
                            lot_id: item.lot_id.clone(),
                            reference: Some(DocumentRef::Receipt(header.receipt_id.clone())),
                            remarks: Some("检验不合格入隔离仓".to_string()),
                            created_by: completed_by.to_string(),
                        },
                        true,
                    )?;
                    // 行的事务引用改指隔离仓事务,取消冲销据此找到实际入账
                    ReceiptRepository::update_item_transaction_tx(
                        &tx,
                        &item.item_id,
                        &quarantine_transaction.transaction_id,
                    )?;
                    info!(
                        line_no = item.line_no,
                        quarantine_warehouse_id = %quarantine_id,
                        "不合格行已改道隔离仓"
                    );
                }
                InspectionStatus::Pending => unreachable!("门禁 1 已拒绝待检行"),
            }
        }

        ReceiptRepository::update_status_tx(&tx, receipt_id, ReceiptStatus::Completed)?;
        tx.commit().map_err(RepositoryError::from)?;
        info!(receipt_id, receipt_number = %header.receipt_number, "收货单已完成");

        header.status = ReceiptStatus::Completed;
        Ok(header)
    }

    // ==========================================
    // 取消收货
    // ==========================================

    /// 取消收货单
    ///
    /// 已取消的单据不可重复取消。每个有批次的行:
    /// - 停用批次(不删除)
    /// - 已入账事务: 创建等量 auto-approve 的 OUT_ISSUE 冲销
    /// - 仍挂起事务: 驳回(余额从未入账,无需冲销)
    #[instrument(skip(self, reason))]
    pub fn cancel_receipt(
        &self,
        receipt_id: &str,
        reason: &str,
        cancelled_by: &str,
    ) -> LedgerResult<GoodsReceipt> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let (mut header, items) = ReceiptRepository::find_by_id_tx(&tx, receipt_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "GoodsReceipt".to_string(),
                id: receipt_id.to_string(),
            })?;

        if header.status == ReceiptStatus::Cancelled {
            return Err(LedgerError::InvalidStateTransition {
                from: header.status.to_string(),
                to: ReceiptStatus::Cancelled.to_string(),
            });
        }

        for item in &items {
            let Some(ref lot_id) = item.lot_id else {
                continue;
            };

            // 冲销已入账的行;挂起事务直接驳回
            if let Some(ref transaction_id) = item.transaction_id {
                match TransactionRepository::find_by_id_tx(&tx, transaction_id)? {
                    Some(ref t)
                        if t.approval_status == crate::domain::types::ApprovalStatus::Approved =>
                    {
                        let transaction_number = numbering::next_outbound_transaction_number(
                            &tx,
                            &header.tenant_id,
                            &header.receipt_number,
                        )?;
                        // 冲销必须落在实际入账的仓库(不合格行入账在隔离仓)
                        InventoryLedger::create_in_tx(
                            &tx,
                            NewTransaction {
                                tenant_id: header.tenant_id.clone(),
                                transaction_number,
                                transaction_type: TransactionType::OutIssue,
                                quantity: item.quantity,
                                unit: item.unit.clone(),
                                warehouse_id: t.warehouse_id.clone(),
                                to_warehouse_id: None,
                                product_id: item.product_id.clone(),
                                lot_id: Some(lot_id.clone()),
                                reference: Some(DocumentRef::Receipt(header.receipt_id.clone())),
                                remarks: Some(format!("收货取消冲销: {}", reason)),
                                created_by: cancelled_by.to_string(),
                            },
                            true,
                        )?;
                    }
                    Some(ref t)
                        if t.approval_status == crate::domain::types::ApprovalStatus::Pending =>
                    {
                        TransactionRepository::update_approval_tx(
                            &tx,
                            transaction_id,
                            crate::domain::types::ApprovalStatus::Rejected,
                            cancelled_by,
                            Utc::now(),
                            Some(reason),
                        )?;
                    }
                    _ => {}
                }
            }

            LotRepository::adjust_current_quantity_tx(&tx, lot_id, -item.quantity)?;
            LotRepository::deactivate_tx(&tx, lot_id)?;
        }

        ReceiptRepository::update_status_tx(&tx, receipt_id, ReceiptStatus::Cancelled)?;
        tx.commit().map_err(RepositoryError::from)?;
        info!(receipt_id, reason, "收货单已取消");

        header.status = ReceiptStatus::Cancelled;
        Ok(header)
    }

    // ==========================================
    // 查询与检验回执
    // ==========================================

    /// 按 ID 查询收货单(单头 + 行项目)
    pub fn find_receipt(
        &self,
        receipt_id: &str,
    ) -> LedgerResult<Option<(GoodsReceipt, Vec<GoodsReceiptItem>)>> {
        Ok(self.receipt_repo.find_by_id(receipt_id)?)
    }

    /// 写入行级检验结论(质检服务回执)
    ///
    /// 只接受 PASS / FAIL;单头离开 PENDING/INSPECTING 后结论封存
    pub fn record_inspection_result(
        &self,
        item_id: &str,
        result: InspectionStatus,
    ) -> LedgerResult<()> {
        if !matches!(result, InspectionStatus::Pass | InspectionStatus::Fail) {
            return Err(LedgerError::InvalidInput(format!(
                "检验结论只接受 PASS/FAIL: {}",
                result
            )));
        }
        let header = self
            .receipt_repo
            .find_header_by_item(item_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "GoodsReceiptItem".to_string(),
                id: item_id.to_string(),
            })?;
        if !matches!(
            header.status,
            ReceiptStatus::Pending | ReceiptStatus::Inspecting
        ) {
            return Err(LedgerError::InvalidInput(format!(
                "收货单{}状态为{},检验结论不可再写入",
                header.receipt_number, header.status
            )));
        }
        self.receipt_repo.update_item_inspection(item_id, result)?;
        info!(item_id, result = %result, "收货行检验结论已写入");
        Ok(())
    }
}
