// ==========================================
// ReceivingWorkflow 收货工作流集成测试
// ==========================================
// 测试目标: 验证收货单状态机与检验门控下的入账时点
// 覆盖范围: 免检直入/待检门控/不合格改道隔离仓/取消冲销/单号生成
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use mes_inventory_ledger::config::tenant_config::{TenantConfigManager, KEY_QUARANTINE_WAREHOUSE};
use mes_inventory_ledger::domain::lot::LotUpdate;
use mes_inventory_ledger::domain::receipt::{NewReceipt, NewReceiptItem};
use mes_inventory_ledger::domain::types::{
    DocumentRef, InspectionStatus, QualityStatus, ReceiptStatus, TransactionType,
};
use mes_inventory_ledger::engine::{LedgerError, ReceivingWorkflow};
use mes_inventory_ledger::domain::types::WarehouseType;
use mes_inventory_ledger::repository::{
    InspectionRepository, LotRepository, ReceiptRepository, TransactionRepository,
    WarehouseRepository,
};
use test_helpers::{
    create_test_db, open_test_connection, query_balance, seed_incoming_standard, seed_warehouse,
};

const TENANT: &str = "T001";
const PRODUCT: &str = "P001";
const WH1: &str = "WH1";
const WH_QC: &str = "WH-QC";

fn new_receipt(items: Vec<NewReceiptItem>) -> NewReceipt {
    NewReceipt {
        tenant_id: TENANT.to_string(),
        receipt_number: None,
        supplier_name: Some("测试供应商".to_string()),
        receipt_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        remarks: None,
        created_by: "tester".to_string(),
        items,
    }
}

fn new_item(lot_number: &str, quantity: f64, inspection: Option<InspectionStatus>) -> NewReceiptItem {
    NewReceiptItem {
        product_id: PRODUCT.to_string(),
        warehouse_id: WH1.to_string(),
        quantity,
        unit: "EA".to_string(),
        unit_price: 2.5,
        lot_number: Some(lot_number.to_string()),
        expiry_date: None,
        inspection_status: inspection,
    }
}

#[test]
fn test_not_required_item_credits_at_creation() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let (header, items) = workflow
        .create_receipt(new_receipt(vec![new_item("L-001", 100.0, None)]))
        .expect("创建收货单失败");

    // 单号自动生成 GR-YYYYMMDD-NNNN
    assert_eq!(header.receipt_number, "GR-20260115-0001");
    assert_eq!(header.status, ReceiptStatus::Pending);
    assert_eq!(header.total_quantity, 100.0);
    assert_eq!(header.total_amount, 250.0);

    // 免检行创建时刻即入账
    let lot_id = items[0].lot_id.as_deref().unwrap();
    let (available, _) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(lot_id)).unwrap();
    assert_eq!(available, 100.0);

    // 完成: 批次置 PASSED,不重复入账
    let completed = workflow.complete_receipt(&header.receipt_id, "tester").unwrap();
    assert_eq!(completed.status, ReceiptStatus::Completed);
    let lot = LotRepository::from_connection(conn.clone())
        .find_by_id(lot_id)
        .unwrap()
        .unwrap();
    assert_eq!(lot.quality_status, QualityStatus::Passed);
    let (available, _) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(lot_id)).unwrap();
    assert_eq!(available, 100.0, "完成收货不应重复入账");
}

#[test]
fn test_inspection_gates_balance_until_pass() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_incoming_standard(&conn, TENANT, PRODUCT);
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let (header, items) = workflow
        .create_receipt(new_receipt(vec![new_item(
            "L-001",
            50.0,
            Some(InspectionStatus::Pending),
        )]))
        .unwrap();

    // 待检行: 单头 INSPECTING,检验申请已开,余额未动
    assert_eq!(header.status, ReceiptStatus::Inspecting);
    let request_id = items[0].inspection_request_id.as_deref().unwrap();
    let request = InspectionRepository::from_connection(conn.clone())
        .find_request(request_id)
        .unwrap()
        .expect("检验申请应已落库");
    assert_eq!(request.product_id, PRODUCT);
    assert_eq!(request.quantity, 50.0);
    let lot_id = items[0].lot_id.clone().unwrap();
    assert!(query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).is_none());

    // 检验未完成时不允许完成收货
    let err = workflow
        .complete_receipt(&header.receipt_id, "tester")
        .unwrap_err();
    assert!(matches!(err, LedgerError::InspectionNotCompleted(_)));

    // 回执 PASS 后完成: 入账 + 批次合格
    workflow
        .record_inspection_result(&items[0].item_id, InspectionStatus::Pass)
        .unwrap();
    workflow.complete_receipt(&header.receipt_id, "tester").unwrap();
    let (available, _) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!(available, 50.0);
    let lot = LotRepository::from_connection(conn.clone())
        .find_by_id(&lot_id)
        .unwrap()
        .unwrap();
    assert_eq!(lot.quality_status, QualityStatus::Passed);
}

#[test]
fn test_failed_item_requires_quarantine_config() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let (header, items) = workflow
        .create_receipt(new_receipt(vec![new_item(
            "L-001",
            30.0,
            Some(InspectionStatus::Pending),
        )]))
        .unwrap();
    workflow
        .record_inspection_result(&items[0].item_id, InspectionStatus::Fail)
        .unwrap();

    // 未配置隔离仓: 完成被显式拒绝,不静默入常规仓
    let err = workflow
        .complete_receipt(&header.receipt_id, "tester")
        .unwrap_err();
    assert!(matches!(err, LedgerError::QuarantineNotConfigured(_)));
    let lot_id = items[0].lot_id.clone().unwrap();
    assert!(query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).is_none());

    // 配置指向不存在的仓库: 同样拒绝
    let config = TenantConfigManager::from_connection(conn.clone());
    config.set(TENANT, KEY_QUARANTINE_WAREHOUSE, WH_QC).unwrap();
    assert_eq!(
        config.quarantine_warehouse_id(TENANT).unwrap().as_deref(),
        Some(WH_QC)
    );
    let err = workflow
        .complete_receipt(&header.receipt_id, "tester")
        .unwrap_err();
    assert!(matches!(err, LedgerError::QuarantineNotConfigured(_)));

    // 隔离仓就位后: 入账改道隔离仓,批次置 FAILED
    seed_warehouse(&conn, TENANT, WH_QC, WarehouseType::Quarantine);
    let quarantine_list = WarehouseRepository::from_connection(conn.clone())
        .find_by_type(TENANT, WarehouseType::Quarantine)
        .unwrap();
    assert!(quarantine_list.iter().any(|w| w.warehouse_id == WH_QC));
    let completed = workflow.complete_receipt(&header.receipt_id, "tester").unwrap();
    assert_eq!(completed.status, ReceiptStatus::Completed);

    assert!(
        query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).is_none(),
        "常规仓不应有任何入账"
    );
    let (quarantined, _) = query_balance(&conn, TENANT, WH_QC, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!(quarantined, 30.0, "不合格数量应全额进入隔离仓");

    let lot = LotRepository::from_connection(conn.clone())
        .find_by_id(&lot_id)
        .unwrap()
        .unwrap();
    assert_eq!(lot.quality_status, QualityStatus::Failed);
}

#[test]
fn test_cancel_completed_receipt_reverses_quarantine_credit() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let config = TenantConfigManager::from_connection(conn.clone());
    config.set(TENANT, KEY_QUARANTINE_WAREHOUSE, WH_QC).unwrap();
    seed_warehouse(&conn, TENANT, WH_QC, WarehouseType::Quarantine);
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let (header, items) = workflow
        .create_receipt(new_receipt(vec![new_item(
            "L-001",
            30.0,
            Some(InspectionStatus::Pending),
        )]))
        .unwrap();
    workflow
        .record_inspection_result(&items[0].item_id, InspectionStatus::Fail)
        .unwrap();
    workflow.complete_receipt(&header.receipt_id, "tester").unwrap();

    let lot_id = items[0].lot_id.clone().unwrap();
    let (quarantined, _) = query_balance(&conn, TENANT, WH_QC, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!(quarantined, 30.0);

    // 不合格行的事务引用必须指向隔离仓入账
    let (_, items) = workflow.find_receipt(&header.receipt_id).unwrap().unwrap();
    let transaction = TransactionRepository::from_connection(conn.clone())
        .find_by_id(items[0].transaction_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(transaction.warehouse_id, WH_QC);

    // 取消已完成单据: 冲销落在隔离仓,不留幻影库存
    workflow
        .cancel_receipt(&header.receipt_id, "退供应商", "tester")
        .unwrap();
    let (available, reserved) = query_balance(&conn, TENANT, WH_QC, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!(
        (available, reserved),
        (0.0, 0.0),
        "隔离仓入账必须被全额冲销"
    );
    let lot = LotRepository::from_connection(conn.clone())
        .find_by_id(&lot_id)
        .unwrap()
        .unwrap();
    assert!(!lot.is_active);
    assert_eq!(lot.current_quantity, 0.0);
}

#[test]
fn test_reused_lot_returns_to_pending_when_inspection_required() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn.clone());
    let lot_repo = LotRepository::from_connection(conn.clone());

    // 首次免检收货: 批次合格,直接入账
    let (_, items) = workflow
        .create_receipt(new_receipt(vec![new_item("L-001", 20.0, None)]))
        .unwrap();
    let lot_id = items[0].lot_id.clone().unwrap();
    assert_eq!(
        lot_repo.find_by_id(&lot_id).unwrap().unwrap().quality_status,
        QualityStatus::Passed
    );

    // 同批次号再收且需检验: 整批退回待检,不得静默吸收未检数量
    let (header, items) = workflow
        .create_receipt(new_receipt(vec![new_item(
            "L-001",
            10.0,
            Some(InspectionStatus::Pending),
        )]))
        .unwrap();
    let lot = lot_repo.find_by_id(&lot_id).unwrap().unwrap();
    assert_eq!(lot.quality_status, QualityStatus::Pending);
    assert_eq!(lot.current_quantity, 30.0);

    // 回执 PASS 并完成: 批次恢复合格,两次收货均已入账
    workflow
        .record_inspection_result(&items[0].item_id, InspectionStatus::Pass)
        .unwrap();
    workflow.complete_receipt(&header.receipt_id, "tester").unwrap();
    assert_eq!(
        lot_repo.find_by_id(&lot_id).unwrap().unwrap().quality_status,
        QualityStatus::Passed
    );
    let (available, _) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!(available, 30.0);
}

#[test]
fn test_inspection_result_sealed_after_completion() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let (header, items) = workflow
        .create_receipt(new_receipt(vec![new_item(
            "L-001",
            10.0,
            Some(InspectionStatus::Pending),
        )]))
        .unwrap();
    workflow
        .record_inspection_result(&items[0].item_id, InspectionStatus::Pass)
        .unwrap();
    workflow.complete_receipt(&header.receipt_id, "tester").unwrap();

    // 已完成单据的检验结论封存,不可改写
    let err = workflow
        .record_inspection_result(&items[0].item_id, InspectionStatus::Fail)
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    let (_, items) = workflow.find_receipt(&header.receipt_id).unwrap().unwrap();
    assert_eq!(items[0].inspection_status, InspectionStatus::Pass);
}

#[test]
fn test_cancel_receipt_compensates_and_deactivates_lot() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let (header, items) = workflow
        .create_receipt(new_receipt(vec![new_item("L-001", 100.0, None)]))
        .unwrap();
    let lot_id = items[0].lot_id.clone().unwrap();
    let (available, _) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!(available, 100.0);

    let cancelled = workflow
        .cancel_receipt(&header.receipt_id, "供应商召回", "tester")
        .unwrap();
    assert_eq!(cancelled.status, ReceiptStatus::Cancelled);

    // 冲销: 余额归零,批次停用
    let (available, reserved) = query_balance(&conn, TENANT, WH1, PRODUCT, Some(&lot_id)).unwrap();
    assert_eq!((available, reserved), (0.0, 0.0));
    let lot = LotRepository::from_connection(conn.clone())
        .find_by_id(&lot_id)
        .unwrap()
        .unwrap();
    assert!(!lot.is_active, "取消后批次必须停用");
    assert_eq!(lot.current_quantity, 0.0);

    // 单据下留有两笔台账: 原 IN_RECEIVE 与冲销 OUT_ISSUE
    let txs = TransactionRepository::from_connection(conn.clone())
        .find_by_reference(TENANT, &DocumentRef::Receipt(header.receipt_id.clone()))
        .unwrap();
    assert_eq!(txs.len(), 2);
    assert!(txs
        .iter()
        .any(|t| t.transaction_type == TransactionType::OutIssue));

    // 已取消不可重复取消
    let err = workflow
        .cancel_receipt(&header.receipt_id, "again", "tester")
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
}

#[test]
fn test_lot_metadata_backfill_after_receipt() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let (_, items) = workflow
        .create_receipt(new_receipt(vec![new_item("L-001", 10.0, None)]))
        .unwrap();
    let lot_id = items[0].lot_id.clone().unwrap();

    // 收货后补录有效期与备注,未提交字段保持原值
    let lot_repo = LotRepository::from_connection(conn.clone());
    let updated = lot_repo
        .update(
            &lot_id,
            &LotUpdate {
                expiry_date: NaiveDate::from_ymd_opt(2027, 6, 30),
                remarks: Some("标签补扫".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.expiry_date, NaiveDate::from_ymd_opt(2027, 6, 30));
    assert_eq!(updated.remarks.as_deref(), Some("标签补扫"));
    assert_eq!(updated.supplier_name.as_deref(), Some("测试供应商"));
    assert_eq!(updated.current_quantity, 10.0);
}

#[test]
fn test_duplicate_receipt_number_rejected() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn.clone());

    let mut req = new_receipt(vec![new_item("L-001", 10.0, None)]);
    req.receipt_number = Some("GR-X-0001".to_string());
    let (first, _) = workflow.create_receipt(req).unwrap();

    let mut dup = new_receipt(vec![new_item("L-002", 10.0, None)]);
    dup.receipt_number = Some("GR-X-0001".to_string());
    let err = workflow.create_receipt(dup).unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateResource(_)));

    // 原单保持不变
    let found = ReceiptRepository::from_connection(conn.clone())
        .find_by_number(TENANT, "GR-X-0001")
        .unwrap()
        .unwrap();
    assert_eq!(found.receipt_id, first.receipt_id);
}

#[test]
fn test_receipt_numbers_increment_per_day() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn);

    let (first, _) = workflow
        .create_receipt(new_receipt(vec![new_item("L-001", 10.0, None)]))
        .unwrap();
    let (second, _) = workflow
        .create_receipt(new_receipt(vec![new_item("L-002", 10.0, None)]))
        .unwrap();
    assert_eq!(first.receipt_number, "GR-20260115-0001");
    assert_eq!(second.receipt_number, "GR-20260115-0002");
}

#[test]
fn test_empty_receipt_rejected() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    let workflow = ReceivingWorkflow::from_connection(conn);

    let err = workflow.create_receipt(new_receipt(vec![])).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
}
