// ==========================================
// MES 库存台账系统 - 库存余额领域模型
// ==========================================
// 红线: 唯一事实层,"哪里有多少库存"以此为准
// 红线: 只通过事务应用或预留接口变更,从不删除,只清零
// ==========================================

use crate::domain::types::TransactionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BalanceKey - 余额键
// ==========================================
// 身份: (tenant, warehouse, product, lot-or-null)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub tenant_id: String,
    pub warehouse_id: String,
    pub product_id: String,
    pub lot_id: Option<String>,
}

impl BalanceKey {
    pub fn new(
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
        lot_id: Option<&str>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            product_id: product_id.to_string(),
            lot_id: lot_id.map(|s| s.to_string()),
        }
    }
}

// ==========================================
// InventoryBalance - 库存余额
// ==========================================
// 不变量: available_quantity >= 0 且 reserved_quantity >= 0
// 在手总量 = available + reserved
// 余额行在首次移动触及该键时惰性创建
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryBalance {
    // ===== 主键 =====
    pub balance_id: String, // 余额行唯一标识(UUID)

    // ===== 余额键 =====
    pub tenant_id: String,
    pub warehouse_id: String,
    pub product_id: String,
    pub lot_id: Option<String>, // NULL 表示不分批次的聚合行

    // ===== 数量 =====
    pub available_quantity: f64, // 可用数量
    pub reserved_quantity: f64,  // 预留数量
    pub unit: String,            // 计量单位

    // ===== 最后事务信息(每次 apply 更新) =====
    pub last_transaction_date: Option<DateTime<Utc>>,
    pub last_transaction_type: Option<TransactionType>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryBalance {
    /// 在手总量
    pub fn on_hand(&self) -> f64 {
        self.available_quantity + self.reserved_quantity
    }
}
