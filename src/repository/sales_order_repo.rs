// ==========================================
// MES 库存台账系统 - 销售订单行数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 销售订单头管理是外部协作方,此处只维护行级已交付数量
// ==========================================

use crate::domain::types::DeliveryStatus;
use crate::domain::warehouse::{OrderDeliverySummary, SalesOrderLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// SalesOrderRepository - 销售订单行仓储
// ==========================================

/// 销售订单行仓储
/// 职责: 管理 sales_order_line 表的已交付数量与交付状态重算
pub struct SalesOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

const LINE_COLUMNS: &str =
    "line_id, order_id, tenant_id, product_id, ordered_quantity, delivered_quantity";

fn map_line(row: &Row<'_>) -> SqliteResult<SalesOrderLine> {
    Ok(SalesOrderLine {
        line_id: row.get(0)?,
        order_id: row.get(1)?,
        tenant_id: row.get(2)?,
        product_id: row.get(3)?,
        ordered_quantity: row.get(4)?,
        delivered_quantity: row.get(5)?,
    })
}

impl SalesOrderRepository {
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

    /// 插入订单行
    pub fn insert_line(&self, line: &SalesOrderLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO sales_order_line ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                LINE_COLUMNS
            ),
            params![
                line.line_id,
                line.order_id,
                line.tenant_id,
                line.product_id,
                line.ordered_quantity,
                line.delivered_quantity,
            ],
        )?;
        Ok(())
    }

    /// 按 ID 查询订单行
    pub fn find_line(&self, line_id: &str) -> RepositoryResult<Option<SalesOrderLine>> {
        let conn = self.get_conn()?;
        let line = conn
            .query_row(
                &format!(
                    "SELECT {} FROM sales_order_line WHERE line_id = ?1",
                    LINE_COLUMNS
                ),
                params![line_id],
                map_line,
            )
            .optional()?;
        Ok(line)
    }

    /// 递增订单行已交付数量(事务内)
    pub fn add_delivered_quantity_tx(
        conn: &Connection,
        line_id: &str,
        quantity: f64,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE sales_order_line \
             SET delivered_quantity = delivered_quantity + ?1 \
             WHERE line_id = ?2",
            params![quantity, line_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "SalesOrderLine".to_string(),
                id: line_id.to_string(),
            });
        }
        Ok(())
    }

    /// 查询订单全部行
    pub fn find_lines_by_order(&self, order_id: &str) -> RepositoryResult<Vec<SalesOrderLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sales_order_line WHERE order_id = ?1 ORDER BY line_id",
            LINE_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![order_id], map_line)?
            .collect::<SqliteResult<Vec<SalesOrderLine>>>()?;
        Ok(lines)
    }

    /// 重算订单交付状态
    ///
    /// 所有行足量交付 -> DELIVERED;部分交付 -> PARTIALLY_DELIVERED;
    /// 无任何交付 -> NOT_DELIVERED
    pub fn recompute_delivery_status(
        &self,
        order_id: &str,
    ) -> RepositoryResult<OrderDeliverySummary> {
        let lines = self.find_lines_by_order(order_id)?;
        if lines.is_empty() {
            return Err(RepositoryError::NotFound {
                entity: "SalesOrder".to_string(),
                id: order_id.to_string(),
            });
        }

        let total_lines = lines.len();
        let fully_delivered_lines = lines.iter().filter(|l| l.is_fully_delivered()).count();
        let any_delivered = lines.iter().any(|l| l.delivered_quantity > 0.0);

        let delivery_status = if fully_delivered_lines == total_lines {
            DeliveryStatus::Delivered
        } else if any_delivered {
            DeliveryStatus::PartiallyDelivered
        } else {
            DeliveryStatus::NotDelivered
        };

        Ok(OrderDeliverySummary {
            order_id: order_id.to_string(),
            total_lines,
            fully_delivered_lines,
            delivery_status,
        })
    }
}
