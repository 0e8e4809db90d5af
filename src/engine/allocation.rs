// ==========================================
// MES 库存台账系统 - 批次分配引擎
// ==========================================
// 职责: 按策略(FIFO/FEFO/指定批次)生成批次分配方案
// 红线: 贪心填充,不回溯;候选耗尽仍有缺口时整单失败,
//       不返回部分方案(全有或全无)
// 说明: 分配只产出方案,不落账;扣减由发货处理或台账事务完成
// ==========================================

use crate::domain::types::AllocationStrategy;
use crate::engine::error::{LedgerError, LedgerResult};
use crate::repository::balance_repo::{AllocationCandidate, BalanceRepository};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

// ==========================================
// LotAllocation - 单个批次的分配结果
// ==========================================
// 携带分配时刻的批次可用量与有效期,供调用方直接组装发货行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub lot_id: String,
    pub lot_number: String,
    pub allocated_quantity: f64,
    pub available_quantity: f64,
    pub expiry_date: Option<NaiveDate>,
}

// ==========================================
// LotAllocationEngine - 批次分配引擎
// ==========================================

pub struct LotAllocationEngine {
    balance_repo: BalanceRepository,
}

impl LotAllocationEngine {
    /// 从已有连接创建分配引擎
    pub fn from_connection(conn: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self {
            balance_repo: BalanceRepository::from_connection(conn),
        }
    }

    /// 生成批次分配方案
    ///
    /// # 参数
    /// - required_quantity: 需求数量(必须 > 0)
    /// - strategy: FIFO / FEFO / 指定批次
    ///
    /// # 返回
    /// 按消耗顺序排列的分配明细;需求无法全额满足时返回
    /// InsufficientInventory(携带需求量与可用总量)
    #[instrument(skip(self), fields(strategy = %strategy))]
    pub fn allocate(
        &self,
        tenant_id: &str,
        warehouse_id: &str,
        product_id: &str,
        required_quantity: f64,
        strategy: AllocationStrategy,
    ) -> LedgerResult<Vec<LotAllocation>> {
        if required_quantity <= 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "需求数量必须大于 0: {}",
                required_quantity
            )));
        }

        let candidates =
            self.balance_repo
                .find_allocation_candidates(tenant_id, warehouse_id, product_id)?;
        debug!(candidate_count = candidates.len(), "分配候选已加载");

        Self::plan(candidates, required_quantity, strategy)
    }

    /// 对候选集执行排序与贪心填充(纯函数,便于单测)
    fn plan(
        mut candidates: Vec<AllocationCandidate>,
        required_quantity: f64,
        strategy: AllocationStrategy,
    ) -> LedgerResult<Vec<LotAllocation>> {
        match strategy {
            AllocationStrategy::SpecificLot(ref lot_id) => {
                // 指定批次: 单一候选,数量不足即失败
                return match candidates.into_iter().find(|c| &c.lot_id == lot_id) {
                    Some(c) if c.available_quantity >= required_quantity => {
                        Ok(vec![LotAllocation {
                            lot_id: c.lot_id,
                            lot_number: c.lot_number,
                            allocated_quantity: required_quantity,
                            available_quantity: c.available_quantity,
                            expiry_date: c.expiry_date,
                        }])
                    }
                    Some(c) => Err(LedgerError::InsufficientInventory {
                        requested: required_quantity,
                        available: c.available_quantity,
                    }),
                    None => Err(LedgerError::InsufficientInventory {
                        requested: required_quantity,
                        available: 0.0,
                    }),
                };
            }
            AllocationStrategy::Fifo => {
                // 先进先出: 批次创建时间升序,同时间按批次号
                candidates.sort_by(|a, b| {
                    a.lot_created_at
                        .cmp(&b.lot_created_at)
                        .then_with(|| a.lot_number.cmp(&b.lot_number))
                });
            }
            AllocationStrategy::Fefo => {
                // 近效期先出: 有效期升序;无有效期批次排在所有有日期批次之后,
                // 相互之间按创建时间升序
                candidates.sort_by(|a, b| match (a.expiry_date, b.expiry_date) {
                    (Some(ea), Some(eb)) => ea
                        .cmp(&eb)
                        .then_with(|| a.lot_created_at.cmp(&b.lot_created_at)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => a.lot_created_at.cmp(&b.lot_created_at),
                });
            }
        }

        // 贪心填充,不回溯
        let total_available: f64 = candidates.iter().map(|c| c.available_quantity).sum();
        let mut remaining = required_quantity;
        let mut allocations = Vec::new();

        for candidate in candidates {
            if remaining <= 0.0 {
                break;
            }
            let take = candidate.available_quantity.min(remaining);
            if take <= 0.0 {
                continue;
            }
            remaining -= take;
            allocations.push(LotAllocation {
                lot_id: candidate.lot_id,
                lot_number: candidate.lot_number,
                allocated_quantity: take,
                available_quantity: candidate.available_quantity,
                expiry_date: candidate.expiry_date,
            });
        }

        if remaining > 0.0 {
            return Err(LedgerError::InsufficientInventory {
                requested: required_quantity,
                available: total_available,
            });
        }

        Ok(allocations)
    }
}
