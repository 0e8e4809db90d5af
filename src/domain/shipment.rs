// ==========================================
// MES 库存台账系统 - 发货单领域模型
// ==========================================
// 状态机: PENDING -> (INSPECTING) -> SHIPPED
//         PENDING|INSPECTING -> CANCELLED
// 红线: SHIPPED 之前库存未动,取消/删除无需回冲
// ==========================================

use crate::domain::types::{InspectionStatus, ShipmentStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Shipment - 发货单头
// ==========================================
// 单号格式: SH-YYYYMMDD-NNNN(租户内按日递增)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    // ===== 主键 =====
    pub shipment_id: String, // 发货单唯一标识(UUID)

    // ===== 身份 =====
    pub tenant_id: String,       // 租户
    pub shipment_number: String, // 发货单号

    // ===== 单头信息 =====
    pub customer_name: Option<String>,  // 客户名称
    pub sales_order_id: Option<String>, // 来源销售订单
    pub status: ShipmentStatus,         // 单头状态
    pub shipment_date: NaiveDate,       // 发货日期

    // ===== 合计 =====
    pub total_quantity: f64,
    pub total_amount: f64,

    pub remarks: Option<String>,

    // ===== 审计字段 =====
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// ShipmentItem - 发货单行项目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentItem {
    // ===== 主键 =====
    pub item_id: String,

    // ===== 关联 =====
    pub shipment_id: String, // 所属发货单

    // ===== 行内容 =====
    pub line_no: i32,
    pub product_id: String,
    pub warehouse_id: String, // 出货仓库
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub amount: f64, // = quantity * unit_price

    // ===== 批次 =====
    pub lot_id: Option<String>, // 显式指定批次;None 时 FIFO 自动选批

    // ===== 检验(OQC) =====
    pub inspection_status: InspectionStatus,

    // ===== 销售订单溯源 =====
    pub sales_order_line_id: Option<String>, // 来源销售订单行

    // ===== 处理结果 =====
    pub delivered: bool,                // 是否已出库
    pub transaction_id: Option<String>, // 该行对应的 OUT_SHIPPING 事务
}

// ==========================================
// NewShipment / NewShipmentItem - 发货单创建请求
// ==========================================
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub tenant_id: String,
    /// 发货单号;None 时自动生成 SH-YYYYMMDD-NNNN
    pub shipment_number: Option<String>,
    pub customer_name: Option<String>,
    pub sales_order_id: Option<String>,
    pub shipment_date: NaiveDate,
    pub remarks: Option<String>,
    pub created_by: String,
    pub items: Vec<NewShipmentItem>,
}

#[derive(Debug, Clone)]
pub struct NewShipmentItem {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub lot_id: Option<String>,
    /// None 时缺省为 NOT_REQUIRED
    pub inspection_status: Option<InspectionStatus>,
    pub sales_order_line_id: Option<String>,
}
