// ==========================================
// LotAllocationEngine 引擎集成测试
// ==========================================
// 测试目标: 验证 FIFO/FEFO/指定批次三种分配策略
// 覆盖范围: 排序规则、贪心填充、全有或全无、候选过滤
// ==========================================

mod test_helpers;

use chrono::{NaiveDate, TimeZone, Utc};
use mes_inventory_ledger::domain::types::AllocationStrategy;
use mes_inventory_ledger::engine::{LedgerError, LotAllocationEngine};
use test_helpers::{create_test_db, open_test_connection, seed_lot_with_balance};

const TENANT: &str = "T001";
const PRODUCT: &str = "P001";
const WH1: &str = "WH1";

#[test]
fn test_fefo_and_fifo_worked_example() {
    // 批次 A: 第 1 天创建,数量 10,有效期第 30 天
    // 批次 B: 第 2 天创建,数量 10,有效期第 20 天
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "A",
        10.0,
        NaiveDate::from_ymd_opt(2026, 1, 30),
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
    );
    seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "B",
        10.0,
        NaiveDate::from_ymd_opt(2026, 1, 20),
        Utc.with_ymd_and_hms(2026, 1, 2, 8, 0, 0).unwrap(),
    );
    let engine = LotAllocationEngine::from_connection(conn);

    // FEFO 取 15: B 先到期 -> [(B,10), (A,5)]
    let fefo = engine
        .allocate(TENANT, WH1, PRODUCT, 15.0, AllocationStrategy::Fefo)
        .expect("FEFO 分配失败");
    assert_eq!(fefo.len(), 2);
    assert_eq!(fefo[0].lot_number, "B");
    assert_eq!(fefo[0].allocated_quantity, 10.0);
    assert_eq!(fefo[0].available_quantity, 10.0);
    assert_eq!(fefo[0].expiry_date, NaiveDate::from_ymd_opt(2026, 1, 20));
    assert_eq!(fefo[1].lot_number, "A");
    assert_eq!(fefo[1].allocated_quantity, 5.0);
    assert_eq!(fefo[1].available_quantity, 10.0);
    assert_eq!(fefo[1].expiry_date, NaiveDate::from_ymd_opt(2026, 1, 30));
    println!("FEFO 方案: {:?}", fefo);

    // FIFO 取 15: A 先创建 -> [(A,10), (B,5)]
    let fifo = engine
        .allocate(TENANT, WH1, PRODUCT, 15.0, AllocationStrategy::Fifo)
        .expect("FIFO 分配失败");
    assert_eq!(fifo[0].lot_number, "A");
    assert_eq!(fifo[0].allocated_quantity, 10.0);
    assert_eq!(fifo[1].lot_number, "B");
    assert_eq!(fifo[1].allocated_quantity, 5.0);
    println!("FIFO 方案: {:?}", fifo);
}

#[test]
fn test_fifo_never_skips_earlier_lot_with_stock() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    for (lot_number, day, quantity) in [("L1", 1, 3.0), ("L2", 2, 100.0), ("L3", 3, 50.0)] {
        seed_lot_with_balance(
            &conn,
            TENANT,
            WH1,
            PRODUCT,
            lot_number,
            quantity,
            None,
            Utc.with_ymd_and_hms(2026, 1, day, 8, 0, 0).unwrap(),
        );
    }
    let engine = LotAllocationEngine::from_connection(conn);

    let plan = engine
        .allocate(TENANT, WH1, PRODUCT, 10.0, AllocationStrategy::Fifo)
        .unwrap();
    // 最早批次 L1 虽小也必须先耗尽
    assert_eq!(plan[0].lot_number, "L1");
    assert_eq!(plan[0].allocated_quantity, 3.0);
    assert_eq!(plan[1].lot_number, "L2");
    assert_eq!(plan[1].allocated_quantity, 7.0);
}

#[test]
fn test_fefo_undated_lots_sort_after_dated() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "UNDATED",
        10.0,
        None,
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
    );
    seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "DATED",
        10.0,
        NaiveDate::from_ymd_opt(2026, 6, 1),
        Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap(),
    );
    let engine = LotAllocationEngine::from_connection(conn);

    let plan = engine
        .allocate(TENANT, WH1, PRODUCT, 12.0, AllocationStrategy::Fefo)
        .unwrap();
    // 无有效期批次排在所有有日期批次之后,哪怕创建更早
    assert_eq!(plan[0].lot_number, "DATED");
    assert_eq!(plan[1].lot_number, "UNDATED");
    assert_eq!(plan[1].allocated_quantity, 2.0);
}

#[test]
fn test_over_allocation_fails_atomically() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "L1",
        10.0,
        None,
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
    );
    seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "L2",
        5.0,
        None,
        Utc.with_ymd_and_hms(2026, 1, 2, 8, 0, 0).unwrap(),
    );
    let engine = LotAllocationEngine::from_connection(conn);

    // 候选总量 15 < 需求 20: 不返回部分方案
    let err = engine
        .allocate(TENANT, WH1, PRODUCT, 20.0, AllocationStrategy::Fifo)
        .unwrap_err();
    match err {
        LedgerError::InsufficientInventory {
            requested,
            available,
        } => {
            assert_eq!(requested, 20.0);
            assert_eq!(available, 15.0);
        }
        other => panic!("期望 InsufficientInventory,实际: {:?}", other),
    }
}

#[test]
fn test_specific_lot_strategy() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let lot_id = seed_lot_with_balance(
        &conn,
        TENANT,
        WH1,
        PRODUCT,
        "L1",
        10.0,
        None,
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
    );
    let engine = LotAllocationEngine::from_connection(conn);

    let plan = engine
        .allocate(
            TENANT,
            WH1,
            PRODUCT,
            8.0,
            AllocationStrategy::SpecificLot(lot_id.clone()),
        )
        .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].lot_id, lot_id);
    assert_eq!(plan[0].allocated_quantity, 8.0);
    assert_eq!(plan[0].available_quantity, 10.0);

    // 指定批次数量不足: 整单失败
    let err = engine
        .allocate(
            TENANT,
            WH1,
            PRODUCT,
            12.0,
            AllocationStrategy::SpecificLot(lot_id),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientInventory { .. }));

    // 不存在的批次同样失败
    let err = engine
        .allocate(
            TENANT,
            WH1,
            PRODUCT,
            1.0,
            AllocationStrategy::SpecificLot("lot-missing".to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientInventory { .. }));
}

#[test]
fn test_zero_requirement_rejected() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let engine = LotAllocationEngine::from_connection(conn);

    let err = engine
        .allocate(TENANT, WH1, PRODUCT, 0.0, AllocationStrategy::Fifo)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
}
