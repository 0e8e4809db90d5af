// ==========================================
// ReservationApi 集成测试
// ==========================================
// 测试目标: 验证 available <-> reserved 搬运语义
// 覆盖范围: 预留/释放、往返恢复、超量拒绝
// ==========================================

mod test_helpers;

use chrono::{TimeZone, Utc};
use mes_inventory_ledger::engine::{LedgerError, ReservationApi};
use test_helpers::{create_test_db, open_test_connection, query_balance, seed_lot_with_balance};

const TENANT: &str = "T001";
const PRODUCT: &str = "P001";
const WH1: &str = "WH1";

fn setup() -> (
    tempfile::NamedTempFile,
    std::sync::Arc<std::sync::Mutex<rusqlite::Connection>>,
    String,
) {
    let (temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let lot_id = seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "L1",
        100.0,
        None,
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
    );
    (temp, conn, lot_id)
}

#[test]
fn test_reserve_moves_available_to_reserved() {
    let (_temp, conn, lot_id) = setup();
    let api = ReservationApi::from_connection(conn.clone());

    let balance = api
        .reserve(TENANT, WH1, PRODUCT, Some(&lot_id), 30.0)
        .expect("预留失败");
    assert_eq!(balance.available_quantity, 70.0);
    assert_eq!(balance.reserved_quantity, 30.0);

    // 在手总量不变
    let (available, reserved) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!(available + reserved, 100.0);
}

#[test]
fn test_reserve_release_round_trip_restores_exactly() {
    let (_temp, conn, lot_id) = setup();
    let api = ReservationApi::from_connection(conn.clone());

    let before = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();
    api.reserve(TENANT, WH1, PRODUCT, Some(&lot_id), 40.0).unwrap();
    api.release(TENANT, WH1, PRODUCT, Some(&lot_id), 40.0).unwrap();
    let after = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();

    assert_eq!(before, after, "预留-释放往返必须精确恢复余额");
}

#[test]
fn test_reserve_more_than_available_fails() {
    let (_temp, conn, lot_id) = setup();
    let api = ReservationApi::from_connection(conn.clone());

    let err = api
        .reserve(TENANT, WH1, PRODUCT, Some(&lot_id), 120.0)
        .unwrap_err();
    match err {
        LedgerError::InsufficientInventory {
            requested,
            available,
        } => {
            assert_eq!(requested, 120.0);
            assert_eq!(available, 100.0);
        }
        other => panic!("期望 InsufficientInventory,实际: {:?}", other),
    }
    // 失败后余额不变
    let (available, reserved) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!((available, reserved), (100.0, 0.0));
}

#[test]
fn test_release_more_than_reserved_fails() {
    let (_temp, conn, lot_id) = setup();
    let api = ReservationApi::from_connection(conn.clone());

    api.reserve(TENANT, WH1, PRODUCT, Some(&lot_id), 10.0).unwrap();
    let err = api
        .release(TENANT, WH1, PRODUCT, Some(&lot_id), 25.0)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientInventory { .. }));
}

#[test]
fn test_reserve_on_missing_balance_fails() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let api = ReservationApi::from_connection(conn);

    // 余额行不存在: 可用量按 0 报不足
    let err = api.reserve(TENANT, WH1, PRODUCT, None, 1.0).unwrap_err();
    match err {
        LedgerError::InsufficientInventory { available, .. } => assert_eq!(available, 0.0),
        other => panic!("期望 InsufficientInventory,实际: {:?}", other),
    }
}
