// ==========================================
// MES 库存台账系统 - 发货工作流
// ==========================================
// 状态机: PENDING -> (INSPECTING) -> SHIPPED
//         PENDING|INSPECTING -> CANCELLED
// 红线: SHIPPED 之前库存未动;取消/删除无需回冲
// 红线: 出库处理全有或全无 -- 任一行门禁失败或批次不足,
//       整单失败且余额不动
// ==========================================

use crate::domain::shipment::{NewShipment, Shipment, ShipmentItem};
use crate::domain::transaction::NewTransaction;
use crate::domain::types::{
    DocumentRef, InspectionStatus, ShipmentStatus, TransactionType,
};
use crate::domain::warehouse::OrderDeliverySummary;
use crate::engine::error::{LedgerError, LedgerResult};
use crate::engine::ledger::InventoryLedger;
use crate::engine::numbering;
use crate::repository::balance_repo::BalanceRepository;
use crate::repository::error::RepositoryError;
use crate::repository::lot_repo::LotRepository;
use crate::repository::sales_order_repo::SalesOrderRepository;
use crate::repository::shipment_repo::ShipmentRepository;
use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

// ==========================================
// ShippingWorkflow - 发货工作流
// ==========================================

pub struct ShippingWorkflow {
    conn: Arc<Mutex<Connection>>,
    shipment_repo: ShipmentRepository,
    sales_order_repo: SalesOrderRepository,
}

impl ShippingWorkflow {
    /// 从已有连接创建发货工作流
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            shipment_repo: ShipmentRepository::from_connection(conn.clone()),
            sales_order_repo: SalesOrderRepository::from_connection(conn.clone()),
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
    // 创建发货单
    // ==========================================

    /// 创建发货单(库存不动,只做可用量预检)
    ///
    /// # 行为
    /// - 逐行预检 (仓库, 产品) 可用量 >= 行数量,不足即失败,无任何持久化
    /// - 单号缺省时生成 SH-YYYYMMDD-NNNN
    /// - 任一行需 OQC 检验 -> 单头 INSPECTING,否则 PENDING
    #[instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    pub fn create_shipment(
        &self,
        req: NewShipment,
    ) -> LedgerResult<(Shipment, Vec<ShipmentItem>)> {
        if req.items.is_empty() {
            return Err(LedgerError::InvalidInput("发货单至少需要一行".to_string()));
        }
        for (idx, item) in req.items.iter().enumerate() {
            if item.quantity <= 0.0 {
                return Err(LedgerError::InvalidInput(format!(
                    "第{}行发货数量必须大于 0: {}",
                    idx + 1,
                    item.quantity
                )));
            }
        }

        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        // 预检: 全部行通过才允许落单
        for item in &req.items {
            let available = BalanceRepository::sum_available_tx(
                &tx,
                &req.tenant_id,
                &item.warehouse_id,
                &item.product_id,
            )?;
            if available < item.quantity {
                return Err(LedgerError::InsufficientInventory {
                    requested: item.quantity,
                    available,
                });
            }
        }

        let shipment_number = match req.shipment_number {
            Some(number) => number,
            None => numbering::next_shipment_number(&tx, &req.tenant_id, req.shipment_date)?,
        };

        let total_quantity: f64 = req.items.iter().map(|i| i.quantity).sum();
        let total_amount: f64 = req.items.iter().map(|i| i.quantity * i.unit_price).sum();
        let any_inspection = req
            .items
            .iter()
            .any(|i| i.inspection_status == Some(InspectionStatus::Pending));
        let status = if any_inspection {
            ShipmentStatus::Inspecting
        } else {
            ShipmentStatus::Pending
        };

        let now = Utc::now();
        let header = Shipment {
            shipment_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: req.tenant_id.clone(),
            shipment_number,
            customer_name: req.customer_name,
            sales_order_id: req.sales_order_id,
            status,
            shipment_date: req.shipment_date,
            total_quantity,
            total_amount,
            remarks: req.remarks,
            created_by: req.created_by,
            created_at: now,
            updated_at: now,
        };
        ShipmentRepository::insert_header_tx(&tx, &header)?;

        let mut items = Vec::with_capacity(req.items.len());
        for (idx, new_item) in req.items.into_iter().enumerate() {
            let item = ShipmentItem {
                item_id: uuid::Uuid::new_v4().to_string(),
                shipment_id: header.shipment_id.clone(),
                line_no: (idx + 1) as i32,
                product_id: new_item.product_id,
                warehouse_id: new_item.warehouse_id,
                quantity: new_item.quantity,
                unit: new_item.unit,
                unit_price: new_item.unit_price,
                amount: new_item.quantity * new_item.unit_price,
                lot_id: new_item.lot_id,
                inspection_status: new_item
                    .inspection_status
                    .unwrap_or(InspectionStatus::NotRequired),
                sales_order_line_id: new_item.sales_order_line_id,
                delivered: false,
                transaction_id: None,
            };
            ShipmentRepository::insert_item_tx(&tx, &item)?;
            items.push(item);
        }

        tx.commit().map_err(RepositoryError::from)?;
        info!(
            shipment_id = %header.shipment_id,
            shipment_number = %header.shipment_number,
            item_count = items.len(),
            "发货单已创建"
        );
        Ok((header, items))
    }

    // ==========================================
    // 出库处理
    // ==========================================

    /// 出库处理(库存变动时刻,全有或全无)
    ///
    /// # 门禁(任一失败整单失败,余额不动)
    /// - 任一行 OQC 待检 -> InspectionNotCompleted
    /// - 任一行 OQC 不合格 -> InspectionFailed
    ///
    /// # 行为(每行)
    /// - 选批: 显式指定批次优先;否则 FIFO 选第一个
    ///   合格、活动、当前数量足额的批次
    /// - OUT_SHIPPING 事务(auto-approve) + 批次扣减 + 余额扣减,
    ///   同一工作单元内提交
    /// - 关联销售订单行时递增已交付数量
    ///
    /// # 返回
    /// 更新后的单头;来源订单存在时附交付状态汇总
    #[instrument(skip(self))]
    pub fn process_shipment(
        &self,
        shipment_id: &str,
        processed_by: &str,
    ) -> LedgerResult<(Shipment, Option<OrderDeliverySummary>)> {
        let order_id;
        let mut header = {
            let conn = self.get_conn()?;
            let tx = conn
                .unchecked_transaction()
                .map_err(RepositoryError::from)?;

            let (header, items) = ShipmentRepository::find_by_id_tx(&tx, shipment_id)?
                .ok_or_else(|| LedgerError::NotFound {
                    entity: "Shipment".to_string(),
                    id: shipment_id.to_string(),
                })?;

            if !matches!(
                header.status,
                ShipmentStatus::Pending | ShipmentStatus::Inspecting
            ) {
                return Err(LedgerError::InvalidStateTransition {
                    from: header.status.to_string(),
                    to: ShipmentStatus::Shipped.to_string(),
                });
            }

            // 门禁: OQC 全部解析完且无不合格,余额才允许变动
            let pending_lines: Vec<i32> = items
                .iter()
                .filter(|i| i.inspection_status == InspectionStatus::Pending)
                .map(|i| i.line_no)
                .collect();
            if !pending_lines.is_empty() {
                return Err(LedgerError::InspectionNotCompleted(format!(
                    "发货单{}存在待检行: {:?}",
                    header.shipment_number, pending_lines
                )));
            }
            let failed_lines: Vec<i32> = items
                .iter()
                .filter(|i| i.inspection_status == InspectionStatus::Fail)
                .map(|i| i.line_no)
                .collect();
            if !failed_lines.is_empty() {
                return Err(LedgerError::InspectionFailed(format!(
                    "发货单{}存在不合格行: {:?}",
                    header.shipment_number, failed_lines
                )));
            }

            for item in &items {
                if item.delivered {
                    continue;
                }

                let lot = Self::select_lot_tx(&tx, &header.tenant_id, item)?;

                let transaction_number = numbering::next_outbound_transaction_number(
                    &tx,
                    &header.tenant_id,
                    &header.shipment_number,
                )?;
                let transaction = InventoryLedger::create_in_tx(
                    &tx,
                    NewTransaction {
                        tenant_id: header.tenant_id.clone(),
                        transaction_number,
                        transaction_type: TransactionType::OutShipping,
                        quantity: item.quantity,
                        unit: item.unit.clone(),
                        warehouse_id: item.warehouse_id.clone(),
                        to_warehouse_id: None,
                        product_id: item.product_id.clone(),
                        lot_id: Some(lot.lot_id.clone()),
                        reference: Some(DocumentRef::Shipment(header.shipment_id.clone())),
                        remarks: None,
                        created_by: processed_by.to_string(),
                    },
                    true,
                )?;

                LotRepository::adjust_current_quantity_tx(&tx, &lot.lot_id, -item.quantity)?;
                ShipmentRepository::mark_item_delivered_tx(
                    &tx,
                    &item.item_id,
                    &lot.lot_id,
                    &transaction.transaction_id,
                )?;

                if let Some(ref line_id) = item.sales_order_line_id {
                    SalesOrderRepository::add_delivered_quantity_tx(&tx, line_id, item.quantity)?;
                }
            }

            ShipmentRepository::update_status_tx(&tx, shipment_id, ShipmentStatus::Shipped)?;
            tx.commit().map_err(RepositoryError::from)?;

            order_id = header.sales_order_id.clone();
            header
        };

        header.status = ShipmentStatus::Shipped;
        info!(
            shipment_id,
            shipment_number = %header.shipment_number,
            "发货单已出库"
        );

        // 来源订单交付状态重算(连接锁已释放)
        let summary = match order_id {
            Some(ref order_id) => Some(self.sales_order_repo.recompute_delivery_status(order_id)?),
            None => None,
        };
        if let Some(ref summary) = summary {
            info!(
                order_id = %summary.order_id,
                delivery_status = %summary.delivery_status,
                "订单交付状态已重算"
            );
        }

        Ok((header, summary))
    }

    /// 选批(事务内): 显式指定优先,否则 FIFO
    fn select_lot_tx(
        conn: &Connection,
        tenant_id: &str,
        item: &ShipmentItem,
    ) -> LedgerResult<crate::domain::lot::Lot> {
        if let Some(ref lot_id) = item.lot_id {
            let lot = LotRepository::find_by_id_tx(conn, lot_id)?.ok_or_else(|| {
                LedgerError::NotFound {
                    entity: "Lot".to_string(),
                    id: lot_id.clone(),
                }
            })?;
            if lot.quality_status != crate::domain::types::QualityStatus::Passed || !lot.is_active
            {
                return Err(LedgerError::InvalidInput(format!(
                    "批次{}不可发货: 质量状态={}, 活动={}",
                    lot.lot_number, lot.quality_status, lot.is_active
                )));
            }
            if lot.current_quantity < item.quantity {
                return Err(LedgerError::InsufficientInventory {
                    requested: item.quantity,
                    available: lot.current_quantity,
                });
            }
            return Ok(lot);
        }

        // FIFO: 第一个足额的合格活动批次
        let mut lots =
            LotRepository::find_shippable_tx(conn, tenant_id, &item.product_id, item.quantity)?;
        if lots.is_empty() {
            let available =
                BalanceRepository::sum_available_tx(conn, tenant_id, &item.warehouse_id, &item.product_id)?;
            return Err(LedgerError::InsufficientInventory {
                requested: item.quantity,
                available,
            });
        }
        Ok(lots.remove(0))
    }

    // ==========================================
    // 取消与删除
    // ==========================================

    /// 取消发货单(仅 PENDING/INSPECTING;库存未动,无需回冲)
    #[instrument(skip(self))]
    pub fn cancel_shipment(&self, shipment_id: &str) -> LedgerResult<Shipment> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let (mut header, _items) = ShipmentRepository::find_by_id_tx(&tx, shipment_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "Shipment".to_string(),
                id: shipment_id.to_string(),
            })?;

        if !matches!(
            header.status,
            ShipmentStatus::Pending | ShipmentStatus::Inspecting
        ) {
            return Err(LedgerError::InvalidStateTransition {
                from: header.status.to_string(),
                to: ShipmentStatus::Cancelled.to_string(),
            });
        }

        ShipmentRepository::update_status_tx(&tx, shipment_id, ShipmentStatus::Cancelled)?;
        tx.commit().map_err(RepositoryError::from)?;
        info!(shipment_id, "发货单已取消");

        header.status = ShipmentStatus::Cancelled;
        Ok(header)
    }

    /// 删除发货单(仅 PENDING/CANCELLED;行项目级联删除)
    #[instrument(skip(self))]
    pub fn delete_shipment(&self, shipment_id: &str) -> LedgerResult<()> {
        let header = self
            .shipment_repo
            .find_by_id(shipment_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "Shipment".to_string(),
                id: shipment_id.to_string(),
            })?
            .0;

        if !matches!(
            header.status,
            ShipmentStatus::Pending | ShipmentStatus::Cancelled
        ) {
            return Err(LedgerError::InvalidStateTransition {
                from: header.status.to_string(),
                to: "DELETED".to_string(),
            });
        }

        self.shipment_repo.delete(shipment_id)?;
        info!(shipment_id, "发货单已删除");
        Ok(())
    }

    // ==========================================
    // 查询与检验回执
    // ==========================================

    /// 按 ID 查询发货单(单头 + 行项目)
    pub fn find_shipment(
        &self,
        shipment_id: &str,
    ) -> LedgerResult<Option<(Shipment, Vec<ShipmentItem>)>> {
        Ok(self.shipment_repo.find_by_id(shipment_id)?)
    }

    /// 写入行级 OQC 检验结论(质检服务回执)
    ///
    /// 单头离开 PENDING/INSPECTING 后结论封存
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
            .shipment_repo
            .find_header_by_item(item_id)?
            .ok_or_else(|| LedgerError::NotFound {
                entity: "ShipmentItem".to_string(),
                id: item_id.to_string(),
            })?;
        if !matches!(
            header.status,
            ShipmentStatus::Pending | ShipmentStatus::Inspecting
        ) {
            return Err(LedgerError::InvalidInput(format!(
                "发货单{}状态为{},检验结论不可再写入",
                header.shipment_number, header.status
            )));
        }
        self.shipment_repo.update_item_inspection(item_id, result)?;
        info!(item_id, result = %result, "发货行检验结论已写入");
        Ok(())
    }
}
