// ==========================================
// MES 库存台账系统 - 库存事务领域模型
// ==========================================
// 红线: 余额变动恰好发生一次,即事务变为 APPROVED 的那一刻
//       创建为 PENDING 时不变动,重复审批不可能(状态守卫)
// ==========================================

use crate::domain::types::{ApprovalStatus, DocumentRef, TransactionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// InventoryTransaction - 库存事务(台账行)
// ==========================================
// 身份: (tenant_id, transaction_number) 租户内唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryTransaction {
    // ===== 主键 =====
    pub transaction_id: String, // 事务唯一标识(UUID)

    // ===== 身份 =====
    pub tenant_id: String,          // 租户
    pub transaction_number: String, // 事务号(IN-<收货单号>-NNN 等)

    // ===== 移动内容 =====
    pub transaction_type: TransactionType, // 事务类型(决定方向)
    pub quantity: f64,                     // 数量(非负,方向由类型决定)
    pub unit: String,                      // 计量单位
    pub warehouse_id: String,              // 仓库(MOVE 时为源仓库)
    pub to_warehouse_id: Option<String>,   // 目的仓库(仅 MOVE)
    pub product_id: String,                // 产品
    pub lot_id: Option<String>,            // 批次(可选)

    // ===== 审批 =====
    pub approval_status: ApprovalStatus,     // 审批状态
    pub approved_by: Option<String>,         // 审批人
    pub approved_at: Option<DateTime<Utc>>,  // 审批时间
    pub reject_reason: Option<String>,       // 驳回原因

    // ===== 溯源 =====
    pub reference: Option<DocumentRef>, // 来源单据(收货单/发货单/调整单/工单)
    pub remarks: Option<String>,        // 备注

    // ===== 审计字段 =====
    pub created_by: String,        // 创建人
    pub created_at: DateTime<Utc>, // 创建时间
}

// ==========================================
// NewTransaction - 事务创建请求
// ==========================================
// 台账 create 接口的输入;审批字段由台账填写,不由调用方提供
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub tenant_id: String,
    pub transaction_number: String,
    pub transaction_type: TransactionType,
    pub quantity: f64,
    pub unit: String,
    pub warehouse_id: String,
    pub to_warehouse_id: Option<String>,
    pub product_id: String,
    pub lot_id: Option<String>,
    pub reference: Option<DocumentRef>,
    pub remarks: Option<String>,
    pub created_by: String,
}
