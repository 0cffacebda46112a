// ==========================================
// Max Import - 核心库
// ==========================================
// 定位: 电子表格（Excel/CSV）→ 遗留业务库 一次性迁移工具
// 技术栈: Rust + SQLite
// 实体族: 商品 / 客户 / 供应商 / 财务
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录/目录/报告
pub mod domain;

// 数据仓储层 - 批量写入/约束闸门/参考表/清空
pub mod repository;

// 导入层 - 读取/映射/标准化/流水线
pub mod importer;

// 配置层
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use config::ImportSettings;

pub use domain::{
    ColumnMapping, EntityFamily, FieldValue, ImportReport, NormalizedRecord, SkipReason,
};

pub use importer::{ImportError, ImportPipeline, ImportResult, PreparedImport};

pub use repository::{CleanupScope, RepositoryError};

pub use api::{ApiError, ImportApi, ImportRequest};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "Max Import";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
