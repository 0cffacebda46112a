// ==========================================
// Max Import - 配置层
// ==========================================
// 职责: 业务常量 + 导入配置（默认值/环境变量/JSON）
// ==========================================

pub mod constants;
pub mod settings;

// 重导出
pub use settings::{default_db_path, env_keys, ImportSettings};
