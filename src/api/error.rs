// ==========================================
// Max Import - API层错误类型
// ==========================================
// 职责: 将导入层/仓储层错误转换为调用方可理解的错误消息
// 消息按当前语言输出（locales/*.yml 的 api.*）
// ==========================================

use crate::domain::report::ImportReport;
use crate::i18n::{t, t_with_args};
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("{}", t("api.import_in_progress"))]
    ImportInProgress,

    // ==========================================
    // 输入错误
    // ==========================================
    #[error("{}", localized("api.invalid_input", .0))]
    InvalidInput(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("{}", localized("api.import_failed", .0))]
    ImportError(String),

    /// 写入阶段中途失败；report 为已提交部分
    #[error("{}", localized("api.load_interrupted", .message))]
    LoadInterrupted {
        report: Box<ImportReport>,
        message: String,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("{}", localized("api.database_error", .0))]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("{}", localized("api.internal_error", .0))]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn localized(key: &str, message: &str) -> String {
    t_with_args(key, &[("message", message)])
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::LoadInterrupted { report, message } => {
                ApiError::LoadInterrupted { report, message }
            }
            ImportError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(err) => ApiError::Other(err),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
