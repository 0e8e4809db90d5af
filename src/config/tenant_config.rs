// ==========================================
// MES 库存台账系统 - 租户配置管理器
// ==========================================
// 职责: 租户级配置加载、查询、覆写管理
// 存储: tenant_config 表 (tenant_id + key-value)
// 红线: 隔离仓必须显式配置,
//       不做"第一条可用记录"的隐式回退(顺序依赖,易碎)
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 隔离仓配置键
pub const KEY_QUARANTINE_WAREHOUSE: &str = "default_quarantine_warehouse_id";

// ==========================================
// TenantConfigManager - 租户配置管理器
// ==========================================
pub struct TenantConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl TenantConfigManager {
    /// 从已有连接创建配置管理器
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取租户配置值
    ///
    /// # 返回
    /// - Ok(Some(String)): 配置值
    /// - Ok(None): 配置不存在
    pub fn get(&self, tenant_id: &str, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        Self::get_tx(&conn, tenant_id, key)
    }

    /// 读取租户配置值(事务内)
    pub fn get_tx(
        conn: &Connection,
        tenant_id: &str,
        key: &str,
    ) -> RepositoryResult<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM tenant_config WHERE tenant_id = ?1 AND key = ?2",
                params![tenant_id, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入租户配置值(upsert)
    pub fn set(&self, tenant_id: &str, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO tenant_config (tenant_id, key, value, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (tenant_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
            params![tenant_id, key, value, Utc::now()],
        )?;
        Ok(())
    }

    /// 读取租户指定的隔离仓 ID
    pub fn quarantine_warehouse_id(&self, tenant_id: &str) -> RepositoryResult<Option<String>> {
        self.get(tenant_id, KEY_QUARANTINE_WAREHOUSE)
    }
}
