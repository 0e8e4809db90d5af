// ==========================================
// MES 库存台账系统 - 引擎层错误类型
// ==========================================
// 职责: 定义业务错误类型,转换 Repository 错误为用户友好的错误消息
// 红线: 所有错误信息必须包含显式原因(可解释性),
//       数量类错误携带"请求 vs 可用",状态类错误携带"当前 vs 目标"
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
///
/// 全部为调用方可恢复的业务错误,不是进程致命错误
#[derive(Error, Debug)]
pub enum LedgerError {
    // ==========================================
    // 实体解析错误
    // ==========================================
    #[error("资源未找到: {entity}(id={id})不存在")]
    NotFound { entity: String, id: String },

    #[error("单号重复: {0}")]
    DuplicateResource(String),

    // ==========================================
    // 工作流守卫错误
    // ==========================================
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 库存数量错误
    // ==========================================
    #[error("库存不足: 需求={requested}, 可用={available}")]
    InsufficientInventory { requested: f64, available: f64 },

    // ==========================================
    // 质检门禁错误
    // ==========================================
    #[error("检验未完成: {0}")]
    InspectionNotCompleted(String),

    #[error("检验不合格: {0}")]
    InspectionFailed(String),

    /// 存在不合格行但租户未配置隔离仓时,完成收货被显式拒绝
    /// (不静默把不合格品计入常规仓)
    #[error("未配置隔离仓: {0}")]
    QuarantineNotConfigured(String),

    // ==========================================
    // 输入校验错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层的技术错误转换为业务错误
// ==========================================
impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            RepositoryError::UniqueConstraintViolation(msg) => LedgerError::DuplicateResource(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                LedgerError::InvalidStateTransition { from, to }
            }
            RepositoryError::DatabaseConnectionError(msg) => {
                LedgerError::DatabaseConnectionError(msg)
            }
            RepositoryError::LockError(msg) => {
                LedgerError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                LedgerError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => LedgerError::DatabaseError(msg),
            RepositoryError::ForeignKeyViolation(msg) => {
                LedgerError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => LedgerError::InvalidInput(msg),
            RepositoryError::ValidationError(msg) => LedgerError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                LedgerError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => LedgerError::InternalError(msg),
            RepositoryError::Other(err) => LedgerError::Other(err),
        }
    }
}

/// Result 类型别名
pub type LedgerResult<T> = Result<T, LedgerError>;
