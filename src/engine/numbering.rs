// ==========================================
// MES 库存台账系统 - 单号生成
// ==========================================
// 规则:
// - 收货单号: GR-YYYYMMDD-NNNN(租户内按日递增,4 位补零)
// - 发货单号: SH-YYYYMMDD-NNNN(同上)
// - 调整单号: ADJ-YYYYMMDD-NNNN(同上,按事务号前缀计数)
// - 事务号:   IN-<收货单号>-NNN / OUT-<发货单号>-NNN(单据内递增,3 位补零)
// 约束: 取号与插入必须在同一事务内,否则并发下会产生重号
// 约束: 单据号序号 = 前缀下已用最大序号 + 1;单据删除后序号不回收
// ==========================================

use crate::engine::error::LedgerResult;
use crate::repository::receipt_repo::ReceiptRepository;
use crate::repository::shipment_repo::ShipmentRepository;
use crate::repository::transaction_repo::TransactionRepository;
use chrono::NaiveDate;
use rusqlite::Connection;

/// 生成收货单号(事务内)
///
/// 格式: GR-YYYYMMDD-NNNN,序号 = 租户当日前缀下已用最大序号 + 1
pub fn next_receipt_number(
    conn: &Connection,
    tenant_id: &str,
    date: NaiveDate,
) -> LedgerResult<String> {
    let prefix = format!("GR-{}-", date.format("%Y%m%d"));
    let sequence = ReceiptRepository::max_number_sequence_tx(conn, tenant_id, &prefix)?;
    Ok(format!("{}{:04}", prefix, sequence + 1))
}

/// 生成发货单号(事务内)
///
/// 格式: SH-YYYYMMDD-NNNN
pub fn next_shipment_number(
    conn: &Connection,
    tenant_id: &str,
    date: NaiveDate,
) -> LedgerResult<String> {
    let prefix = format!("SH-{}-", date.format("%Y%m%d"));
    let sequence = ShipmentRepository::max_number_sequence_tx(conn, tenant_id, &prefix)?;
    Ok(format!("{}{:04}", prefix, sequence + 1))
}

/// 生成盘点调整事务号(事务内)
///
/// 格式: ADJ-YYYYMMDD-NNNN,序号按当日前缀下已有事务数递增
pub fn next_adjustment_number(
    conn: &Connection,
    tenant_id: &str,
    date: NaiveDate,
) -> LedgerResult<String> {
    let prefix = format!("ADJ-{}-", date.format("%Y%m%d"));
    let count = TransactionRepository::count_by_prefix_tx(conn, tenant_id, &prefix)?;
    Ok(format!("{}{:04}", prefix, count + 1))
}

/// 生成入库事务号(事务内)
///
/// 格式: IN-<收货单号>-NNN,单据内按行递增
pub fn next_inbound_transaction_number(
    conn: &Connection,
    tenant_id: &str,
    receipt_number: &str,
) -> LedgerResult<String> {
    let prefix = format!("IN-{}-", receipt_number);
    let count = TransactionRepository::count_by_prefix_tx(conn, tenant_id, &prefix)?;
    Ok(format!("{}{:03}", prefix, count + 1))
}

/// 生成出库事务号(事务内)
///
/// 格式: OUT-<发货单号>-NNN
pub fn next_outbound_transaction_number(
    conn: &Connection,
    tenant_id: &str,
    shipment_number: &str,
) -> LedgerResult<String> {
    let prefix = format!("OUT-{}-", shipment_number);
    let count = TransactionRepository::count_by_prefix_tx(conn, tenant_id, &prefix)?;
    Ok(format!("{}{:03}", prefix, count + 1))
}
