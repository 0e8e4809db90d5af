// ==========================================
// MES 库存台账系统 - 业务引擎层
// ==========================================
// 职责: 台账/分配/收货/发货/预留的业务语义
// 约束: 引擎组合 Repository 的事务内接口,
//       一个业务操作 = 一个 SQLite 事务
// ==========================================

pub mod allocation;
pub mod error;
pub mod ledger;
pub mod numbering;
pub mod receiving;
pub mod reservation;
pub mod shipping;

// 重导出核心引擎
pub use allocation::{LotAllocation, LotAllocationEngine};
pub use error::{LedgerError, LedgerResult};
pub use ledger::InventoryLedger;
pub use receiving::ReceivingWorkflow;
pub use reservation::ReservationApi;
pub use shipping::ShippingWorkflow;
