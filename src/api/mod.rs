// ==========================================
// Max Import - API 层
// ==========================================
// 职责: 提供导入接口，供 CLI 或外部复核界面调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportRequest, MappingPreview};
