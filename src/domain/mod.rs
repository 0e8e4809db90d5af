// ==========================================
// MES 库存台账系统 - 领域层
// ==========================================
// 职责: 实体与类型定义,不含数据访问与业务编排
// ==========================================

pub mod balance;
pub mod lot;
pub mod receipt;
pub mod shipment;
pub mod transaction;
pub mod types;
pub mod warehouse;

// 重导出核心实体
pub use balance::{BalanceKey, InventoryBalance};
pub use lot::{Lot, LotUpdate};
pub use receipt::{GoodsReceipt, GoodsReceiptItem, NewReceipt, NewReceiptItem};
pub use shipment::{NewShipment, NewShipmentItem, Shipment, ShipmentItem};
pub use transaction::{InventoryTransaction, NewTransaction};
pub use warehouse::{OrderDeliverySummary, SalesOrderLine, Warehouse};
