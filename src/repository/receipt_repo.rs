// ==========================================
// MES 库存台账系统 - 收货单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::receipt::{GoodsReceipt, GoodsReceiptItem};
use crate::domain::types::{InspectionStatus, ReceiptStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ReceiptRepository - 收货单仓储
// ==========================================

/// 收货单仓储
/// 职责: 管理 goods_receipt / goods_receipt_item 表
pub struct ReceiptRepository {
    conn: Arc<Mutex<Connection>>,
}

const RECEIPT_COLUMNS: &str = "receipt_id, tenant_id, receipt_number, supplier_name, status, \
     receipt_date, total_quantity, total_amount, remarks, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "item_id, receipt_id, line_no, product_id, warehouse_id, quantity, \
     unit, unit_price, amount, lot_number, lot_id, inspection_status, inspection_request_id, \
     transaction_id";

fn map_receipt(row: &Row<'_>) -> SqliteResult<GoodsReceipt> {
    Ok(GoodsReceipt {
        receipt_id: row.get(0)?,
        tenant_id: row.get(1)?,
        receipt_number: row.get(2)?,
        supplier_name: row.get(3)?,
        status: ReceiptStatus::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(ReceiptStatus::Pending),
        receipt_date: row.get(5)?,
        total_quantity: row.get(6)?,
        total_amount: row.get(7)?,
        remarks: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_item(row: &Row<'_>) -> SqliteResult<GoodsReceiptItem> {
    Ok(GoodsReceiptItem {
        item_id: row.get(0)?,
        receipt_id: row.get(1)?,
        line_no: row.get(2)?,
        product_id: row.get(3)?,
        warehouse_id: row.get(4)?,
        quantity: row.get(5)?,
        unit: row.get(6)?,
        unit_price: row.get(7)?,
        amount: row.get(8)?,
        lot_number: row.get(9)?,
        lot_id: row.get(10)?,
        inspection_status: InspectionStatus::from_str(&row.get::<_, String>(11)?)
            .unwrap_or(InspectionStatus::NotRequired),
        inspection_request_id: row.get(12)?,
        transaction_id: row.get(13)?,
    })
}

impl ReceiptRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 事务内写操作(由引擎在统一工作单元中调用)
    // ==========================================

    /// 插入收货单头(事务内)
    ///
    /// 租户内单号重复由唯一索引拒绝 -> UniqueConstraintViolation
    pub fn insert_header_tx(conn: &Connection, receipt: &GoodsReceipt) -> RepositoryResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO goods_receipt ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                RECEIPT_COLUMNS
            ),
            params![
                receipt.receipt_id,
                receipt.tenant_id,
                receipt.receipt_number,
                receipt.supplier_name,
                receipt.status.to_db_str(),
                receipt.receipt_date,
                receipt.total_quantity,
                receipt.total_amount,
                receipt.remarks,
                receipt.created_by,
                receipt.created_at,
                receipt.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 插入收货单行(事务内)
    pub fn insert_item_tx(conn: &Connection, item: &GoodsReceiptItem) -> RepositoryResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO goods_receipt_item ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                ITEM_COLUMNS
            ),
            params![
                item.item_id,
                item.receipt_id,
                item.line_no,
                item.product_id,
                item.warehouse_id,
                item.quantity,
                item.unit,
                item.unit_price,
                item.amount,
                item.lot_number,
                item.lot_id,
                item.inspection_status.to_db_str(),
                item.inspection_request_id,
                item.transaction_id,
            ],
        )?;
        Ok(())
    }

    /// 更新单头状态(事务内)
    pub fn update_status_tx(
        conn: &Connection,
        receipt_id: &str,
        status: ReceiptStatus,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE goods_receipt SET status = ?1, updated_at = ?2 WHERE receipt_id = ?3",
            params![status.to_db_str(), Utc::now(), receipt_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "GoodsReceipt".to_string(),
                id: receipt_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新行检验状态(事务内)
    pub fn update_item_inspection_tx(
        conn: &Connection,
        item_id: &str,
        status: InspectionStatus,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE goods_receipt_item SET inspection_status = ?1 WHERE item_id = ?2",
            params![status.to_db_str(), item_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "GoodsReceiptItem".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新行事务引用(事务内)
    ///
    /// 不合格行改道隔离仓后,行必须指向实际入账的事务
    pub fn update_item_transaction_tx(
        conn: &Connection,
        item_id: &str,
        transaction_id: &str,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE goods_receipt_item SET transaction_id = ?1 WHERE item_id = ?2",
            params![transaction_id, item_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "GoodsReceiptItem".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 ID 查询收货单(单头 + 行项目,事务内)
    pub fn find_by_id_tx(
        conn: &Connection,
        receipt_id: &str,
    ) -> RepositoryResult<Option<(GoodsReceipt, Vec<GoodsReceiptItem>)>> {
        let header = conn
            .query_row(
                &format!(
                    "SELECT {} FROM goods_receipt WHERE receipt_id = ?1",
                    RECEIPT_COLUMNS
                ),
                params![receipt_id],
                map_receipt,
            )
            .optional()?;

        let Some(header) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM goods_receipt_item WHERE receipt_id = ?1 ORDER BY line_no",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![receipt_id], map_item)?
            .collect::<SqliteResult<Vec<GoodsReceiptItem>>>()?;

        Ok(Some((header, items)))
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按 ID 查询收货单(单头 + 行项目)
    pub fn find_by_id(
        &self,
        receipt_id: &str,
    ) -> RepositoryResult<Option<(GoodsReceipt, Vec<GoodsReceiptItem>)>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, receipt_id)
    }

    /// 按租户和单号查询单头
    pub fn find_by_number(
        &self,
        tenant_id: &str,
        receipt_number: &str,
    ) -> RepositoryResult<Option<GoodsReceipt>> {
        let conn = self.get_conn()?;
        let header = conn
            .query_row(
                &format!(
                    "SELECT {} FROM goods_receipt \
                     WHERE tenant_id = ?1 AND receipt_number = ?2",
                    RECEIPT_COLUMNS
                ),
                params![tenant_id, receipt_number],
                map_receipt,
            )
            .optional()?;
        Ok(header)
    }

    /// 按行项目查询所属单头
    pub fn find_header_by_item(&self, item_id: &str) -> RepositoryResult<Option<GoodsReceipt>> {
        let conn = self.get_conn()?;
        let receipt_id: Option<String> = conn
            .query_row(
                "SELECT receipt_id FROM goods_receipt_item WHERE item_id = ?1",
                params![item_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(receipt_id) = receipt_id else {
            return Ok(None);
        };
        let header = conn
            .query_row(
                &format!(
                    "SELECT {} FROM goods_receipt WHERE receipt_id = ?1",
                    RECEIPT_COLUMNS
                ),
                params![receipt_id],
                map_receipt,
            )
            .optional()?;
        Ok(header)
    }

    /// 更新行检验状态(检验回执写入)
    pub fn update_item_inspection(
        &self,
        item_id: &str,
        status: InspectionStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::update_item_inspection_tx(&conn, item_id, status)
    }

    /// 前缀下已用的最大单号序号(事务内,用于单号生成)
    ///
    /// 取前缀之后的数字部分求 MAX;无匹配单据时返回 0。
    /// 基于 MAX 而非 COUNT: 单据删除后序号不回收,不会重发已用单号
    pub fn max_number_sequence_tx(
        conn: &Connection,
        tenant_id: &str,
        prefix: &str,
    ) -> RepositoryResult<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(CAST(substr(receipt_number, length(?2) + 1) AS INTEGER)) \
             FROM goods_receipt \
             WHERE tenant_id = ?1 AND receipt_number LIKE ?2 || '%'",
            params![tenant_id, prefix],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }
}
