// ==========================================
// MES 库存台账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod balance_repo;
pub mod error;
pub mod inspection_repo;
pub mod lot_repo;
pub mod receipt_repo;
pub mod sales_order_repo;
pub mod shipment_repo;
pub mod transaction_repo;
pub mod warehouse_repo;

// 重导出核心仓储
pub use balance_repo::{AllocationCandidate, BalanceRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use inspection_repo::{InspectionRepository, InspectionRequest, InspectionStandard};
pub use lot_repo::LotRepository;
pub use receipt_repo::ReceiptRepository;
pub use sales_order_repo::SalesOrderRepository;
pub use shipment_repo::ShipmentRepository;
pub use transaction_repo::TransactionRepository;
pub use warehouse_repo::WarehouseRepository;
