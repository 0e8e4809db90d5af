// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、基础数据播种等功能
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use mes_inventory_ledger::db;
use mes_inventory_ledger::domain::balance::BalanceKey;
use mes_inventory_ledger::domain::types::WarehouseType;
use mes_inventory_ledger::domain::warehouse::{SalesOrderLine, Warehouse};
use mes_inventory_ledger::repository::{
    BalanceRepository, InspectionRepository, InspectionStandard, SalesOrderRepository,
    WarehouseRepository,
};
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件(需要保持存活)
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接(统一 PRAGMA)
pub fn open_test_connection(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = db::open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 播种仓库(ID 固定为传入值,便于断言)
pub fn seed_warehouse(
    conn: &Arc<Mutex<Connection>>,
    tenant_id: &str,
    warehouse_id: &str,
    warehouse_type: WarehouseType,
) {
    let mut warehouse = Warehouse::new(
        tenant_id,
        warehouse_id,
        &format!("测试仓库-{}", warehouse_id),
        warehouse_type,
    );
    warehouse.warehouse_id = warehouse_id.to_string();
    WarehouseRepository::from_connection(conn.clone())
        .insert(&warehouse)
        .expect("播种仓库失败");
}

/// 播种合格批次及其余额行
///
/// created_at 可控,用于 FIFO 排序验证;expiry_date 用于 FEFO
#[allow(clippy::too_many_arguments)]
pub fn seed_lot_with_balance(
    conn: &Arc<Mutex<Connection>>,
    tenant_id: &str,
    warehouse_id: &str,
    product_id: &str,
    lot_number: &str,
    quantity: f64,
    expiry_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
) -> String {
    let lot_id = format!("lot-{}", lot_number);
    let conn = conn.lock().unwrap();
    conn.execute(
        "INSERT INTO lot (lot_id, tenant_id, lot_number, product_id, supplier_name, \
         initial_quantity, current_quantity, reserved_quantity, unit, quality_status, \
         expiry_date, is_active, remarks, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5, 0, 'EA', 'PASSED', ?6, 1, NULL, ?7, ?7)",
        params![lot_id, tenant_id, lot_number, product_id, quantity, expiry_date, created_at],
    )
    .expect("播种批次失败");
    conn.execute(
        "INSERT INTO inventory_balance (balance_id, tenant_id, warehouse_id, product_id, lot_id, \
         available_quantity, reserved_quantity, unit, last_transaction_date, \
         last_transaction_type, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'EA', NULL, NULL, ?7, ?7)",
        params![
            format!("bal-{}", lot_number),
            tenant_id,
            warehouse_id,
            product_id,
            lot_id,
            quantity,
            created_at,
        ],
    )
    .expect("播种余额失败");
    lot_id
}

/// 播种来料检验标准
pub fn seed_incoming_standard(
    conn: &Arc<Mutex<Connection>>,
    tenant_id: &str,
    product_id: &str,
) -> String {
    let standard = InspectionStandard {
        standard_id: format!("std-{}", product_id),
        tenant_id: tenant_id.to_string(),
        product_id: product_id.to_string(),
        kind: "INCOMING".to_string(),
        name: format!("来料检验-{}", product_id),
        is_active: true,
    };
    InspectionRepository::from_connection(conn.clone())
        .insert_standard(&standard)
        .expect("播种检验标准失败");
    standard.standard_id
}

/// 播种销售订单行
pub fn seed_sales_order_line(
    conn: &Arc<Mutex<Connection>>,
    tenant_id: &str,
    order_id: &str,
    line_id: &str,
    product_id: &str,
    ordered_quantity: f64,
) {
    let line = SalesOrderLine {
        line_id: line_id.to_string(),
        order_id: order_id.to_string(),
        tenant_id: tenant_id.to_string(),
        product_id: product_id.to_string(),
        ordered_quantity,
        delivered_quantity: 0.0,
    };
    SalesOrderRepository::from_connection(conn.clone())
        .insert_line(&line)
        .expect("播种订单行失败");
}

/// 查询余额行的 (available, reserved)
pub fn query_balance(
    conn: &Arc<Mutex<Connection>>,
    tenant_id: &str,
    warehouse_id: &str,
    product_id: &str,
    lot_id: Option<&str>,
) -> Option<(f64, f64)> {
    let key = BalanceKey::new(tenant_id, warehouse_id, product_id, lot_id);
    BalanceRepository::from_connection(conn.clone())
        .find_by_key(&key)
        .expect("查询余额失败")
        .map(|b| (b.available_quantity, b.reserved_quantity))
}
