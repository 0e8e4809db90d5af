// ==========================================
// MES 库存台账系统 - 批次领域模型
// ==========================================
// 红线: current_quantity >= 0 恒成立
// 生命周期: 收货创建(或复用) -> 质检解析 -> 收货取消时停用(不删除)
// ==========================================

use crate::domain::types::QualityStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Lot - 批次
// ==========================================
// 身份: (tenant_id, lot_number) 租户内唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    // ===== 主键 =====
    pub lot_id: String, // 批次唯一标识(UUID)

    // ===== 身份 =====
    pub tenant_id: String,  // 租户
    pub lot_number: String, // 批次号(租户内唯一,调用方提供或生成)

    // ===== 关联 =====
    pub product_id: String,            // 产品
    pub supplier_name: Option<String>, // 供应商名称

    // ===== 数量 =====
    pub initial_quantity: f64,  // 初始数量(收货时写入,不再变动)
    pub current_quantity: f64,  // 当前数量(随移动单调调整,>= 0)
    pub reserved_quantity: f64, // 预留数量
    pub unit: String,           // 计量单位

    // ===== 质量 =====
    pub quality_status: QualityStatus,  // 质量状态
    pub expiry_date: Option<NaiveDate>, // 有效期(可选)

    // ===== 状态 =====
    pub is_active: bool,         // 活动标志(收货取消时置 false)
    pub remarks: Option<String>, // 备注

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}

impl Lot {
    /// 新建批次(收货首次遇到该批次号时调用)
    pub fn new(
        tenant_id: &str,
        lot_number: &str,
        product_id: &str,
        quantity: f64,
        unit: &str,
        quality_status: QualityStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            lot_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            lot_number: lot_number.to_string(),
            product_id: product_id.to_string(),
            supplier_name: None,
            initial_quantity: quantity,
            current_quantity: quantity,
            reserved_quantity: 0.0,
            unit: unit.to_string(),
            quality_status,
            expiry_date: None,
            is_active: true,
            remarks: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// LotUpdate - 批次部分更新请求
// ==========================================
// 显式列出可变字段,None 表示"不修改"
// (避免整实体覆盖式更新中 null 语义二义)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LotUpdate {
    pub supplier_name: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}
