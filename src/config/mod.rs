// ==========================================
// MES 库存台账系统 - 配置层
// ==========================================
// 职责: 租户级配置(隔离仓等显式指定项)
// ==========================================

pub mod tenant_config;

pub use tenant_config::TenantConfigManager;
