// ==========================================
// MES 库存台账系统 - 批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

use crate::domain::lot::{Lot, LotUpdate};
use crate::domain::types::QualityStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// LotRepository - 批次仓储
// ==========================================

/// 批次仓储
/// 职责: 管理 lot 表的 CRUD 操作
pub struct LotRepository {
    conn: Arc<Mutex<Connection>>,
}

const LOT_COLUMNS: &str = "lot_id, tenant_id, lot_number, product_id, supplier_name, \
     initial_quantity, current_quantity, reserved_quantity, unit, \
     quality_status, expiry_date, is_active, remarks, created_at, updated_at";

/// 行映射
fn map_lot(row: &Row<'_>) -> SqliteResult<Lot> {
    Ok(Lot {
        lot_id: row.get(0)?,
        tenant_id: row.get(1)?,
        lot_number: row.get(2)?,
        product_id: row.get(3)?,
        supplier_name: row.get(4)?,
        initial_quantity: row.get(5)?,
        current_quantity: row.get(6)?,
        reserved_quantity: row.get(7)?,
        unit: row.get(8)?,
        quality_status: QualityStatus::from_str(&row.get::<_, String>(9)?)
            .unwrap_or(QualityStatus::Pending),
        expiry_date: row.get(10)?,
        is_active: row.get(11)?,
        remarks: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl LotRepository {
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

    /// 插入批次(事务内)
    pub fn insert_tx(conn: &Connection, lot: &Lot) -> RepositoryResult<()> {
        conn.execute(
            &format!("INSERT INTO lot ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)", LOT_COLUMNS),
            params![
                lot.lot_id,
                lot.tenant_id,
                lot.lot_number,
                lot.product_id,
                lot.supplier_name,
                lot.initial_quantity,
                lot.current_quantity,
                lot.reserved_quantity,
                lot.unit,
                lot.quality_status.to_db_str(),
                lot.expiry_date,
                lot.is_active,
                lot.remarks,
                lot.created_at,
                lot.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 更新批次质量状态(事务内)
    pub fn update_quality_status_tx(
        conn: &Connection,
        lot_id: &str,
        status: QualityStatus,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE lot SET quality_status = ?1, updated_at = ?2 WHERE lot_id = ?3",
            params![status.to_db_str(), Utc::now(), lot_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Lot".to_string(),
                id: lot_id.to_string(),
            });
        }
        Ok(())
    }

    /// 调整批次当前数量(事务内)
    ///
    /// delta 为带符号增量;结果小于 0 时由 CHECK 约束阻断
    pub fn adjust_current_quantity_tx(
        conn: &Connection,
        lot_id: &str,
        delta: f64,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE lot SET current_quantity = current_quantity + ?1, updated_at = ?2 \
             WHERE lot_id = ?3",
            params![delta, Utc::now(), lot_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Lot".to_string(),
                id: lot_id.to_string(),
            });
        }
        Ok(())
    }

    /// 停用批次(事务内,收货取消时调用;不删除)
    pub fn deactivate_tx(conn: &Connection, lot_id: &str) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE lot SET is_active = 0, updated_at = ?1 WHERE lot_id = ?2",
            params![Utc::now(), lot_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Lot".to_string(),
                id: lot_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 ID 查询批次(事务内)
    pub fn find_by_id_tx(conn: &Connection, lot_id: &str) -> RepositoryResult<Option<Lot>> {
        let lot = conn
            .query_row(
                &format!("SELECT {} FROM lot WHERE lot_id = ?1", LOT_COLUMNS),
                params![lot_id],
                map_lot,
            )
            .optional()?;
        Ok(lot)
    }

    /// 查询可发货批次(事务内)
    ///
    /// 条件: 质量合格、活动、当前数量 >= min_quantity
    /// 排序: 创建时间升序(FIFO),同时间按批次号
    pub fn find_shippable_tx(
        conn: &Connection,
        tenant_id: &str,
        product_id: &str,
        min_quantity: f64,
    ) -> RepositoryResult<Vec<Lot>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lot \
             WHERE tenant_id = ?1 AND product_id = ?2 \
               AND quality_status = 'PASSED' AND is_active = 1 \
               AND current_quantity >= ?3 \
             ORDER BY created_at, lot_number",
            LOT_COLUMNS
        ))?;

        let lots = stmt
            .query_map(params![tenant_id, product_id, min_quantity], map_lot)?
            .collect::<SqliteResult<Vec<Lot>>>()?;
        Ok(lots)
    }

    /// 按租户和批次号查询(事务内)
    pub fn find_by_number_tx(
        conn: &Connection,
        tenant_id: &str,
        lot_number: &str,
    ) -> RepositoryResult<Option<Lot>> {
        let lot = conn
            .query_row(
                &format!(
                    "SELECT {} FROM lot WHERE tenant_id = ?1 AND lot_number = ?2",
                    LOT_COLUMNS
                ),
                params![tenant_id, lot_number],
                map_lot,
            )
            .optional()?;
        Ok(lot)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按 ID 查询批次
    pub fn find_by_id(&self, lot_id: &str) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, lot_id)
    }

    /// 按租户和批次号查询
    pub fn find_by_number(
        &self,
        tenant_id: &str,
        lot_number: &str,
    ) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        Self::find_by_number_tx(&conn, tenant_id, lot_number)
    }

    /// 查询可发货批次
    ///
    /// 条件: 质量合格、活动、当前数量 >= min_quantity
    /// 排序: 创建时间升序(FIFO),同时间按批次号
    pub fn find_shippable(
        &self,
        tenant_id: &str,
        product_id: &str,
        min_quantity: f64,
    ) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        Self::find_shippable_tx(&conn, tenant_id, product_id, min_quantity)
    }

    /// 部分更新批次
    ///
    /// 只覆盖 LotUpdate 中为 Some 的字段,None 表示"不修改"
    pub fn update(&self, lot_id: &str, update: &LotUpdate) -> RepositoryResult<Lot> {
        let conn = self.get_conn()?;

        if let Some(ref supplier_name) = update.supplier_name {
            conn.execute(
                "UPDATE lot SET supplier_name = ?1, updated_at = ?2 WHERE lot_id = ?3",
                params![supplier_name, Utc::now(), lot_id],
            )?;
        }
        if let Some(expiry_date) = update.expiry_date {
            conn.execute(
                "UPDATE lot SET expiry_date = ?1, updated_at = ?2 WHERE lot_id = ?3",
                params![expiry_date, Utc::now(), lot_id],
            )?;
        }
        if let Some(ref remarks) = update.remarks {
            conn.execute(
                "UPDATE lot SET remarks = ?1, updated_at = ?2 WHERE lot_id = ?3",
                params![remarks, Utc::now(), lot_id],
            )?;
        }

        conn.query_row(
            &format!("SELECT {} FROM lot WHERE lot_id = ?1", LOT_COLUMNS),
            params![lot_id],
            map_lot,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "Lot".to_string(),
            id: lot_id.to_string(),
        })
    }
}
