// ==========================================
// MES 库存台账系统 - 仓库与销售订单行模型
// ==========================================
// 仓库注册表与销售订单是台账的外部协作方,
// 此处只建模台账边界需要的字段
// ==========================================

use crate::domain::types::{DeliveryStatus, WarehouseType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Warehouse - 仓库
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: String, // 仓库唯一标识(UUID)
    pub tenant_id: String,    // 租户
    pub code: String,         // 仓库代码
    pub name: String,         // 仓库名称
    pub warehouse_type: WarehouseType, // 仓库类型(NORMAL/QUARANTINE)
    pub is_active: bool,      // 活动标志
    pub created_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn new(tenant_id: &str, code: &str, name: &str, warehouse_type: WarehouseType) -> Self {
        Self {
            warehouse_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            code: code.to_string(),
            name: name.to_string(),
            warehouse_type,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

// ==========================================
// SalesOrderLine - 销售订单行(边界视图)
// ==========================================
// 发货处理时递增 delivered_quantity,
// 订单头交付状态由所有行重算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub line_id: String,            // 订单行唯一标识
    pub order_id: String,           // 所属订单
    pub tenant_id: String,          // 租户
    pub product_id: String,         // 产品
    pub ordered_quantity: f64,      // 订购数量
    pub delivered_quantity: f64,    // 已交付数量
}

impl SalesOrderLine {
    /// 该行是否已足量交付
    pub fn is_fully_delivered(&self) -> bool {
        self.delivered_quantity >= self.ordered_quantity
    }
}

// ==========================================
// OrderDeliverySummary - 订单交付重算结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDeliverySummary {
    pub order_id: String,
    pub total_lines: usize,
    pub fully_delivered_lines: usize,
    pub delivery_status: DeliveryStatus,
}
