// ==========================================
// MES 库存台账系统 - 发货单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::shipment::{Shipment, ShipmentItem};
use crate::domain::types::{InspectionStatus, ShipmentStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ShipmentRepository - 发货单仓储
// ==========================================

/// 发货单仓储
/// 职责: 管理 shipment / shipment_item 表
pub struct ShipmentRepository {
    conn: Arc<Mutex<Connection>>,
}

const SHIPMENT_COLUMNS: &str = "shipment_id, tenant_id, shipment_number, customer_name, \
     sales_order_id, status, shipment_date, total_quantity, total_amount, remarks, \
     created_by, created_at, updated_at";

const ITEM_COLUMNS: &str = "item_id, shipment_id, line_no, product_id, warehouse_id, quantity, \
     unit, unit_price, amount, lot_id, inspection_status, sales_order_line_id, delivered, \
     transaction_id";

fn map_shipment(row: &Row<'_>) -> SqliteResult<Shipment> {
    Ok(Shipment {
        shipment_id: row.get(0)?,
        tenant_id: row.get(1)?,
        shipment_number: row.get(2)?,
        customer_name: row.get(3)?,
        sales_order_id: row.get(4)?,
        status: ShipmentStatus::from_str(&row.get::<_, String>(5)?)
            .unwrap_or(ShipmentStatus::Pending),
        shipment_date: row.get(6)?,
        total_quantity: row.get(7)?,
        total_amount: row.get(8)?,
        remarks: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_item(row: &Row<'_>) -> SqliteResult<ShipmentItem> {
    Ok(ShipmentItem {
        item_id: row.get(0)?,
        shipment_id: row.get(1)?,
        line_no: row.get(2)?,
        product_id: row.get(3)?,
        warehouse_id: row.get(4)?,
        quantity: row.get(5)?,
        unit: row.get(6)?,
        unit_price: row.get(7)?,
        amount: row.get(8)?,
        lot_id: row.get(9)?,
        inspection_status: InspectionStatus::from_str(&row.get::<_, String>(10)?)
            .unwrap_or(InspectionStatus::NotRequired),
        sales_order_line_id: row.get(11)?,
        delivered: row.get(12)?,
        transaction_id: row.get(13)?,
    })
}

impl ShipmentRepository {
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

    /// 插入发货单头(事务内)
    pub fn insert_header_tx(conn: &Connection, shipment: &Shipment) -> RepositoryResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO shipment ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                SHIPMENT_COLUMNS
            ),
            params![
                shipment.shipment_id,
                shipment.tenant_id,
                shipment.shipment_number,
                shipment.customer_name,
                shipment.sales_order_id,
                shipment.status.to_db_str(),
                shipment.shipment_date,
                shipment.total_quantity,
                shipment.total_amount,
                shipment.remarks,
                shipment.created_by,
                shipment.created_at,
                shipment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 插入发货单行(事务内)
    pub fn insert_item_tx(conn: &Connection, item: &ShipmentItem) -> RepositoryResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO shipment_item ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                ITEM_COLUMNS
            ),
            params![
                item.item_id,
                item.shipment_id,
                item.line_no,
                item.product_id,
                item.warehouse_id,
                item.quantity,
                item.unit,
                item.unit_price,
                item.amount,
                item.lot_id,
                item.inspection_status.to_db_str(),
                item.sales_order_line_id,
                item.delivered,
                item.transaction_id,
            ],
        )?;
        Ok(())
    }

    /// 更新单头状态(事务内)
    pub fn update_status_tx(
        conn: &Connection,
        shipment_id: &str,
        status: ShipmentStatus,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE shipment SET status = ?1, updated_at = ?2 WHERE shipment_id = ?3",
            params![status.to_db_str(), Utc::now(), shipment_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Shipment".to_string(),
                id: shipment_id.to_string(),
            });
        }
        Ok(())
    }

    /// 行出库落账(事务内): 选定批次、关联事务、置已交付
    pub fn mark_item_delivered_tx(
        conn: &Connection,
        item_id: &str,
        lot_id: &str,
        transaction_id: &str,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE shipment_item \
             SET delivered = 1, lot_id = ?1, transaction_id = ?2 \
             WHERE item_id = ?3",
            params![lot_id, transaction_id, item_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ShipmentItem".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 ID 查询发货单(单头 + 行项目,事务内)
    pub fn find_by_id_tx(
        conn: &Connection,
        shipment_id: &str,
    ) -> RepositoryResult<Option<(Shipment, Vec<ShipmentItem>)>> {
        let header = conn
            .query_row(
                &format!(
                    "SELECT {} FROM shipment WHERE shipment_id = ?1",
                    SHIPMENT_COLUMNS
                ),
                params![shipment_id],
                map_shipment,
            )
            .optional()?;

        let Some(header) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM shipment_item WHERE shipment_id = ?1 ORDER BY line_no",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![shipment_id], map_item)?
            .collect::<SqliteResult<Vec<ShipmentItem>>>()?;

        Ok(Some((header, items)))
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按 ID 查询发货单(单头 + 行项目)
    pub fn find_by_id(
        &self,
        shipment_id: &str,
    ) -> RepositoryResult<Option<(Shipment, Vec<ShipmentItem>)>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, shipment_id)
    }

    /// 按租户和单号查询单头
    pub fn find_by_number(
        &self,
        tenant_id: &str,
        shipment_number: &str,
    ) -> RepositoryResult<Option<Shipment>> {
        let conn = self.get_conn()?;
        let header = conn
            .query_row(
                &format!(
                    "SELECT {} FROM shipment \
                     WHERE tenant_id = ?1 AND shipment_number = ?2",
                    SHIPMENT_COLUMNS
                ),
                params![tenant_id, shipment_number],
                map_shipment,
            )
            .optional()?;
        Ok(header)
    }

    /// 按行项目查询所属单头
    pub fn find_header_by_item(&self, item_id: &str) -> RepositoryResult<Option<Shipment>> {
        let conn = self.get_conn()?;
        let shipment_id: Option<String> = conn
            .query_row(
                "SELECT shipment_id FROM shipment_item WHERE item_id = ?1",
                params![item_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(shipment_id) = shipment_id else {
            return Ok(None);
        };
        let header = conn
            .query_row(
                &format!(
                    "SELECT {} FROM shipment WHERE shipment_id = ?1",
                    SHIPMENT_COLUMNS
                ),
                params![shipment_id],
                map_shipment,
            )
            .optional()?;
        Ok(header)
    }

    /// 更新行检验状态(OQC 回执写入)
    pub fn update_item_inspection(
        &self,
        item_id: &str,
        status: InspectionStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE shipment_item SET inspection_status = ?1 WHERE item_id = ?2",
            params![status.to_db_str(), item_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ShipmentItem".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除发货单(仅引擎在 PENDING/CANCELLED 守卫后调用;行项目级联删除)
    pub fn delete(&self, shipment_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM shipment WHERE shipment_id = ?1",
            params![shipment_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Shipment".to_string(),
                id: shipment_id.to_string(),
            });
        }
        Ok(())
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
            "SELECT MAX(CAST(substr(shipment_number, length(?2) + 1) AS INTEGER)) \
             FROM shipment \
             WHERE tenant_id = ?1 AND shipment_number LIKE ?2 || '%'",
            params![tenant_id, prefix],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }
}
