// ==========================================
// MES 库存台账与批次分配引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite (rusqlite)
// 系统定位: 制造执行系统的库存事实层
// 红线: 余额只通过台账审批或预留接口变更;
//       一个业务操作 = 一个 SQLite 事务
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 租户配置
pub mod config;

// 数据库基础设施(连接初始化/PRAGMA 统一/建库 DDL)
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AllocationStrategy, ApprovalStatus, DeliveryStatus, DocumentRef, InspectionStatus,
    QualityStatus, ReceiptStatus, ShipmentStatus, TransactionType, WarehouseType,
};

// 领域实体
pub use domain::{
    BalanceKey, GoodsReceipt, GoodsReceiptItem, InventoryBalance, InventoryTransaction, Lot,
    LotUpdate, NewReceipt, NewReceiptItem, NewShipment, NewShipmentItem, NewTransaction,
    OrderDeliverySummary, SalesOrderLine, Shipment, ShipmentItem, Warehouse,
};

// 引擎
pub use engine::{
    InventoryLedger, LedgerError, LedgerResult, LotAllocation, LotAllocationEngine,
    ReceivingWorkflow, ReservationApi, ShippingWorkflow,
};

// 配置
pub use config::TenantConfigManager;

/// 库版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "MES 库存台账与批次分配引擎";
