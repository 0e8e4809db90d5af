// ==========================================
// MES 库存台账系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为,避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout,减少并发写入时的偶发 busy 错误
// - 提供建库 DDL(lot/余额/事务/单据/配置表)
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout(毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema(幂等)
///
/// 余额键唯一性说明: lot_id 可空,SQLite 唯一索引视 NULL 互不相等,
/// 因此用 COALESCE(lot_id,'') 表达式索引保证 (tenant, warehouse, product, lot-or-null) 唯一
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- 批次表
        CREATE TABLE IF NOT EXISTS lot (
            lot_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            lot_number TEXT NOT NULL,
            product_id TEXT NOT NULL,
            supplier_name TEXT,
            initial_quantity REAL NOT NULL,
            current_quantity REAL NOT NULL CHECK (current_quantity >= 0),
            reserved_quantity REAL NOT NULL DEFAULT 0,
            unit TEXT NOT NULL,
            quality_status TEXT NOT NULL,
            expiry_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            remarks TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (tenant_id, lot_number)
        );

        -- 库存余额表(惰性创建,只清零不删除)
        CREATE TABLE IF NOT EXISTS inventory_balance (
            balance_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            warehouse_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            lot_id TEXT,
            available_quantity REAL NOT NULL DEFAULT 0 CHECK (available_quantity >= 0),
            reserved_quantity REAL NOT NULL DEFAULT 0 CHECK (reserved_quantity >= 0),
            unit TEXT NOT NULL,
            last_transaction_date TEXT,
            last_transaction_type TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_balance_key
            ON inventory_balance (tenant_id, warehouse_id, product_id, COALESCE(lot_id, ''));

        -- 库存事务表(台账)
        CREATE TABLE IF NOT EXISTS inventory_transaction (
            transaction_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            transaction_number TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            quantity REAL NOT NULL CHECK (quantity >= 0),
            unit TEXT NOT NULL,
            warehouse_id TEXT NOT NULL,
            to_warehouse_id TEXT,
            product_id TEXT NOT NULL,
            lot_id TEXT,
            approval_status TEXT NOT NULL,
            approved_by TEXT,
            approved_at TEXT,
            reject_reason TEXT,
            reference TEXT,
            remarks TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, transaction_number)
        );

        -- 收货单
        CREATE TABLE IF NOT EXISTS goods_receipt (
            receipt_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            receipt_number TEXT NOT NULL,
            supplier_name TEXT,
            status TEXT NOT NULL,
            receipt_date TEXT NOT NULL,
            total_quantity REAL NOT NULL DEFAULT 0,
            total_amount REAL NOT NULL DEFAULT 0,
            remarks TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (tenant_id, receipt_number)
        );

        CREATE TABLE IF NOT EXISTS goods_receipt_item (
            item_id TEXT PRIMARY KEY,
            receipt_id TEXT NOT NULL REFERENCES goods_receipt(receipt_id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            product_id TEXT NOT NULL,
            warehouse_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            unit TEXT NOT NULL,
            unit_price REAL NOT NULL DEFAULT 0,
            amount REAL NOT NULL DEFAULT 0,
            lot_number TEXT,
            lot_id TEXT,
            inspection_status TEXT NOT NULL,
            inspection_request_id TEXT,
            transaction_id TEXT
        );

        -- 发货单
        CREATE TABLE IF NOT EXISTS shipment (
            shipment_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            shipment_number TEXT NOT NULL,
            customer_name TEXT,
            sales_order_id TEXT,
            status TEXT NOT NULL,
            shipment_date TEXT NOT NULL,
            total_quantity REAL NOT NULL DEFAULT 0,
            total_amount REAL NOT NULL DEFAULT 0,
            remarks TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (tenant_id, shipment_number)
        );

        CREATE TABLE IF NOT EXISTS shipment_item (
            item_id TEXT PRIMARY KEY,
            shipment_id TEXT NOT NULL REFERENCES shipment(shipment_id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            product_id TEXT NOT NULL,
            warehouse_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            unit TEXT NOT NULL,
            unit_price REAL NOT NULL DEFAULT 0,
            amount REAL NOT NULL DEFAULT 0,
            lot_id TEXT,
            inspection_status TEXT NOT NULL,
            sales_order_line_id TEXT,
            delivered INTEGER NOT NULL DEFAULT 0,
            transaction_id TEXT
        );

        -- 仓库注册表(边界协作方)
        CREATE TABLE IF NOT EXISTS warehouse (
            warehouse_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            warehouse_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, code)
        );

        -- 销售订单行(边界协作方,只维护已交付数量)
        CREATE TABLE IF NOT EXISTS sales_order_line (
            line_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            tenant_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            ordered_quantity REAL NOT NULL,
            delivered_quantity REAL NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_sales_order_line_order
            ON sales_order_line (order_id);

        -- 质检标准与检验申请(边界协作方)
        CREATE TABLE IF NOT EXISTS inspection_standard (
            standard_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS inspection_request (
            request_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            standard_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL
        );

        -- 租户级配置(隔离仓/默认检验员等显式指定,不做"第一条可用"回退)
        CREATE TABLE IF NOT EXISTS tenant_config (
            tenant_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, key)
        );
        "#,
    )?;
    Ok(())
}
