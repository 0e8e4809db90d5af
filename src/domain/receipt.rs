// ==========================================
// MES 库存台账系统 - 收货单领域模型
// ==========================================
// 状态机: PENDING -> INSPECTING -> COMPLETED
//         PENDING|INSPECTING -> CANCELLED
// ==========================================

use crate::domain::types::{InspectionStatus, ReceiptStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// GoodsReceipt - 收货单头
// ==========================================
// 身份: (tenant_id, receipt_number) 租户内唯一
// 单号格式: GR-YYYYMMDD-NNNN(租户内按日递增)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceipt {
    // ===== 主键 =====
    pub receipt_id: String, // 收货单唯一标识(UUID)

    // ===== 身份 =====
    pub tenant_id: String,      // 租户
    pub receipt_number: String, // 收货单号

    // ===== 单头信息 =====
    pub supplier_name: Option<String>, // 供应商名称
    pub status: ReceiptStatus,         // 单头状态
    pub receipt_date: NaiveDate,       // 收货日期

    // ===== 合计(行项目求和) =====
    pub total_quantity: f64, // 总数量
    pub total_amount: f64,   // 总金额

    pub remarks: Option<String>, // 备注

    // ===== 审计字段 =====
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==========================================
// GoodsReceiptItem - 收货单行项目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceiptItem {
    // ===== 主键 =====
    pub item_id: String, // 行项目唯一标识(UUID)

    // ===== 关联 =====
    pub receipt_id: String, // 所属收货单

    // ===== 行内容 =====
    pub line_no: i32,         // 行号
    pub product_id: String,   // 产品
    pub warehouse_id: String, // 目标仓库
    pub quantity: f64,        // 收货数量
    pub unit: String,         // 计量单位
    pub unit_price: f64,      // 单价
    pub amount: f64,          // 金额 = quantity * unit_price

    // ===== 批次 =====
    pub lot_number: Option<String>, // 批次号(调用方提供,缺省时生成)
    pub lot_id: Option<String>,     // 解析/创建后的批次 ID

    // ===== 检验 =====
    pub inspection_status: InspectionStatus,   // 检验状态(缺省 NOT_REQUIRED)
    pub inspection_request_id: Option<String>, // 关联的检验申请

    // ===== 事务溯源 =====
    pub transaction_id: Option<String>, // 该行对应的 IN_RECEIVE 事务
}

// ==========================================
// NewReceipt / NewReceiptItem - 收货单创建请求
// ==========================================
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub tenant_id: String,
    /// 收货单号;None 时自动生成 GR-YYYYMMDD-NNNN
    pub receipt_number: Option<String>,
    pub supplier_name: Option<String>,
    pub receipt_date: NaiveDate,
    pub remarks: Option<String>,
    pub created_by: String,
    pub items: Vec<NewReceiptItem>,
}

#[derive(Debug, Clone)]
pub struct NewReceiptItem {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub lot_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// None 时缺省为 NOT_REQUIRED
    pub inspection_status: Option<InspectionStatus>,
}
