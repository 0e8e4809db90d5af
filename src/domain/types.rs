// ==========================================
// MES 库存台账系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 库存事务类型 (Transaction Type)
// ==========================================
// 红线: quantity 永远为非负数量,方向由类型决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    InReceive,    // 采购收货入库
    InProduction, // 生产入库
    InReturn,     // 退货入库
    OutIssue,     // 领料出库
    OutScrap,     // 报废出库
    OutShipping,  // 销售发货出库
    Move,         // 仓库间移库
    Adjust,       // 盘点调整(绝对值覆盖)
}

impl TransactionType {
    /// 是否为入库类型
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            TransactionType::InReceive | TransactionType::InProduction | TransactionType::InReturn
        )
    }

    /// 是否为出库类型
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            TransactionType::OutIssue | TransactionType::OutScrap | TransactionType::OutShipping
        )
    }

    /// 从字符串解析事务类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "IN_RECEIVE" => Some(TransactionType::InReceive),
            "IN_PRODUCTION" => Some(TransactionType::InProduction),
            "IN_RETURN" => Some(TransactionType::InReturn),
            "OUT_ISSUE" => Some(TransactionType::OutIssue),
            "OUT_SCRAP" => Some(TransactionType::OutScrap),
            "OUT_SHIPPING" => Some(TransactionType::OutShipping),
            "MOVE" => Some(TransactionType::Move),
            "ADJUST" => Some(TransactionType::Adjust),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TransactionType::InReceive => "IN_RECEIVE",
            TransactionType::InProduction => "IN_PRODUCTION",
            TransactionType::InReturn => "IN_RETURN",
            TransactionType::OutIssue => "OUT_ISSUE",
            TransactionType::OutScrap => "OUT_SCRAP",
            TransactionType::OutShipping => "OUT_SHIPPING",
            TransactionType::Move => "MOVE",
            TransactionType::Adjust => "ADJUST",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 审批状态 (Approval Status)
// ==========================================
// 红线: 余额变动发生且仅发生在 PENDING -> APPROVED 这一刻
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,  // 待审批(未触碰余额)
    Approved, // 已审批(余额已变动)
    Rejected, // 已驳回(终态,永不触碰余额)
}

impl ApprovalStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ApprovalStatus::Pending),
            "APPROVED" => Some(ApprovalStatus::Approved),
            "REJECTED" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 批次质量状态 (Lot Quality Status)
// ==========================================
// 生命周期: PENDING -> PASSED 或 PENDING -> FAILED,一次性解析
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Pending, // 待检
    Passed,  // 合格
    Failed,  // 不合格
}

impl QualityStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(QualityStatus::Pending),
            "PASSED" => Some(QualityStatus::Passed),
            "FAILED" => Some(QualityStatus::Failed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            QualityStatus::Pending => "PENDING",
            QualityStatus::Passed => "PASSED",
            QualityStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 单据行检验状态 (Inspection Status)
// ==========================================
// 收货/发货行项目的 IQC/OQC 检验结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionStatus {
    NotRequired, // 免检
    Pending,     // 待检验
    Pass,        // 检验合格
    Fail,        // 检验不合格
}

impl InspectionStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NOT_REQUIRED" => Some(InspectionStatus::NotRequired),
            "PENDING" => Some(InspectionStatus::Pending),
            "PASS" => Some(InspectionStatus::Pass),
            "FAIL" => Some(InspectionStatus::Fail),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            InspectionStatus::NotRequired => "NOT_REQUIRED",
            InspectionStatus::Pending => "PENDING",
            InspectionStatus::Pass => "PASS",
            InspectionStatus::Fail => "FAIL",
        }
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 收货单状态 (Receipt Status)
// ==========================================
// 状态机: PENDING -> INSPECTING -> COMPLETED
//         PENDING|INSPECTING -> CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Pending,    // 已创建
    Inspecting, // 检验中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl ReceiptStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ReceiptStatus::Pending),
            "INSPECTING" => Some(ReceiptStatus::Inspecting),
            "COMPLETED" => Some(ReceiptStatus::Completed),
            "CANCELLED" => Some(ReceiptStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "PENDING",
            ReceiptStatus::Inspecting => "INSPECTING",
            ReceiptStatus::Completed => "COMPLETED",
            ReceiptStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 发货单状态 (Shipment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Pending,    // 已创建(库存未动)
    Inspecting, // OQC 检验中(库存未动)
    Shipped,    // 已发货(库存已扣减)
    Cancelled,  // 已取消
}

impl ShipmentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ShipmentStatus::Pending),
            "INSPECTING" => Some(ShipmentStatus::Inspecting),
            "SHIPPED" => Some(ShipmentStatus::Shipped),
            "CANCELLED" => Some(ShipmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "PENDING",
            ShipmentStatus::Inspecting => "INSPECTING",
            ShipmentStatus::Shipped => "SHIPPED",
            ShipmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 仓库类型 (Warehouse Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseType {
    Normal,     // 常规仓
    Quarantine, // 隔离仓(不合格品)
}

impl WarehouseType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NORMAL" => Some(WarehouseType::Normal),
            "QUARANTINE" => Some(WarehouseType::Quarantine),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            WarehouseType::Normal => "NORMAL",
            WarehouseType::Quarantine => "QUARANTINE",
        }
    }
}

impl fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 批次分配策略 (Allocation Strategy)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStrategy {
    /// 先进先出: 按批次创建时间升序消耗
    Fifo,
    /// 近效期先出: 按有效期升序消耗,无有效期批次排最后
    Fefo,
    /// 指定批次: 调用方明确指定 lot_id
    SpecificLot(String),
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStrategy::Fifo => write!(f, "FIFO"),
            AllocationStrategy::Fefo => write!(f, "FEFO"),
            AllocationStrategy::SpecificLot(lot_id) => write!(f, "SPECIFIC_LOT({})", lot_id),
        }
    }
}

// ==========================================
// 单据引用 (Document Reference)
// ==========================================
// 替代"reference_type + reference_id"无类型外键对:
// 以带标签的枚举显式建模已知单据种类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentRef {
    Receipt(String),    // 收货单
    Shipment(String),   // 发货单
    Adjustment(String), // 盘点调整单
    WorkOrder(String),  // 工单
}

impl DocumentRef {
    /// 序列化为数据库存储格式 `kind:id`
    pub fn to_db_str(&self) -> String {
        match self {
            DocumentRef::Receipt(id) => format!("RECEIPT:{}", id),
            DocumentRef::Shipment(id) => format!("SHIPMENT:{}", id),
            DocumentRef::Adjustment(id) => format!("ADJUSTMENT:{}", id),
            DocumentRef::WorkOrder(id) => format!("WORK_ORDER:{}", id),
        }
    }

    /// 从数据库存储格式解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        let (kind, id) = s.split_once(':')?;
        match kind {
            "RECEIPT" => Some(DocumentRef::Receipt(id.to_string())),
            "SHIPMENT" => Some(DocumentRef::Shipment(id.to_string())),
            "ADJUSTMENT" => Some(DocumentRef::Adjustment(id.to_string())),
            "WORK_ORDER" => Some(DocumentRef::WorkOrder(id.to_string())),
            _ => None,
        }
    }

    /// 被引用单据的不透明 ID
    pub fn document_id(&self) -> &str {
        match self {
            DocumentRef::Receipt(id)
            | DocumentRef::Shipment(id)
            | DocumentRef::Adjustment(id)
            | DocumentRef::WorkOrder(id) => id,
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 销售订单交付状态 (Delivery Status)
// ==========================================
// 发货处理后重算: 所有行足量交付为 DELIVERED,否则 PARTIALLY_DELIVERED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    NotDelivered,       // 未交付
    PartiallyDelivered, // 部分交付
    Delivered,          // 全部交付
}

impl DeliveryStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NOT_DELIVERED" => Some(DeliveryStatus::NotDelivered),
            "PARTIALLY_DELIVERED" => Some(DeliveryStatus::PartiallyDelivered),
            "DELIVERED" => Some(DeliveryStatus::Delivered),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DeliveryStatus::NotDelivered => "NOT_DELIVERED",
            DeliveryStatus::PartiallyDelivered => "PARTIALLY_DELIVERED",
            DeliveryStatus::Delivered => "DELIVERED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_direction() {
        assert!(TransactionType::InReceive.is_inbound());
        assert!(TransactionType::InProduction.is_inbound());
        assert!(TransactionType::InReturn.is_inbound());
        assert!(TransactionType::OutIssue.is_outbound());
        assert!(TransactionType::OutScrap.is_outbound());
        assert!(TransactionType::OutShipping.is_outbound());
        // MOVE / ADJUST 两者皆非
        assert!(!TransactionType::Move.is_inbound());
        assert!(!TransactionType::Move.is_outbound());
        assert!(!TransactionType::Adjust.is_inbound());
        assert!(!TransactionType::Adjust.is_outbound());
    }

    #[test]
    fn test_transaction_type_roundtrip() {
        for t in [
            TransactionType::InReceive,
            TransactionType::OutShipping,
            TransactionType::Move,
            TransactionType::Adjust,
        ] {
            assert_eq!(TransactionType::from_str(t.to_db_str()), Some(t));
        }
        assert_eq!(TransactionType::from_str("UNKNOWN"), None);
    }

    #[test]
    fn test_enum_json_uses_db_spelling() {
        // JSON 表示与数据库存储拼写一致,跨边界传输无需二次映射
        assert_eq!(
            serde_json::to_string(&TransactionType::InReceive).unwrap(),
            "\"IN_RECEIVE\""
        );
        assert_eq!(
            serde_json::from_str::<ApprovalStatus>("\"APPROVED\"").unwrap(),
            ApprovalStatus::Approved
        );
        assert_eq!(
            serde_json::to_string(&DeliveryStatus::PartiallyDelivered).unwrap(),
            "\"PARTIALLY_DELIVERED\""
        );
    }

    #[test]
    fn test_document_ref_db_format() {
        let r = DocumentRef::Receipt("GR-20260115-0001".to_string());
        assert_eq!(r.to_db_str(), "RECEIPT:GR-20260115-0001");
        assert_eq!(
            DocumentRef::from_db_str("RECEIPT:GR-20260115-0001"),
            Some(r)
        );
        assert_eq!(DocumentRef::from_db_str("BOGUS:X"), None);
        assert_eq!(DocumentRef::from_db_str("no-colon"), None);
    }
}
