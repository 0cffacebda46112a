// ==========================================
// Max Import - 导入配置
// ==========================================
// 来源优先级: 环境变量 > JSON 配置文件 > 默认值
// 说明: 连接参数之外不持久化任何配置
// ==========================================

use crate::config::constants::{ledger, DEFAULT_CHUNK_SIZE, FIXED_BRANCH_ID};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};

/// 环境变量名
pub mod env_keys {
    pub const DB_PATH: &str = "MAX_IMPORT_DB_PATH";
    pub const CHUNK_SIZE: &str = "MAX_IMPORT_CHUNK_SIZE";
    pub const BRANCH_ID: &str = "MAX_IMPORT_BRANCH_ID";
    pub const DAY_FIRST: &str = "MAX_IMPORT_DAY_FIRST";
    pub const DUE_DATE_COLUMN: &str = "MAX_IMPORT_DUE_DATE_COLUMN";
}

/// 导入配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// 目标库路径
    pub db_path: String,
    /// 批量写入分块大小
    pub chunk_size: usize,
    /// 门店 ID（empId）
    pub branch_id: i64,
    /// 日期解析是否日在前（01/02 = 2月1日）
    pub day_first: bool,
    /// 财务表到期日列名
    pub due_date_column: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            branch_id: FIXED_BRANCH_ID,
            day_first: true,
            due_date_column: ledger::DEFAULT_DUE_DATE_COLUMN.to_string(),
        }
    }
}

impl ImportSettings {
    /// 默认值 + 环境变量覆写
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    /// 从 JSON 文件读取，再应用环境变量覆写
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path)?;
        let mut settings: ImportSettings = serde_json::from_str(&raw)?;
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_value(env_keys::DB_PATH) {
            self.db_path = v;
        }
        if let Some(v) = env_value(env_keys::CHUNK_SIZE).and_then(|v| v.parse::<usize>().ok()) {
            self.chunk_size = v.max(1);
        }
        if let Some(v) = env_value(env_keys::BRANCH_ID).and_then(|v| v.parse::<i64>().ok()) {
            self.branch_id = v;
        }
        if let Some(v) = env_value(env_keys::DAY_FIRST) {
            self.day_first = is_true(&v);
        }
        if let Some(v) = env_value(env_keys::DUE_DATE_COLUMN) {
            self.due_date_column = v;
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_true(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on" | "s" | "sim"
    )
}

/// 默认库路径（用户数据目录下）
pub fn default_db_path() -> String {
    let mut path = PathBuf::from("./max_import.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("max-import");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("max_import.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = ImportSettings::default();
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.branch_id, 1);
        assert!(settings.day_first);
        assert_eq!(settings.due_date_column, "pgtVecmto");
    }

    #[test]
    fn test_is_true() {
        assert!(is_true("1"));
        assert!(is_true(" Sim "));
        assert!(is_true("ON"));
        assert!(!is_true("0"));
        assert!(!is_true("nao"));
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"db_path": "/tmp/legado.db", "chunk_size": 200}}"#).unwrap();

        let settings = ImportSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.db_path, "/tmp/legado.db");
        assert_eq!(settings.chunk_size, 200);
        // 缺省字段使用默认值
        assert_eq!(settings.branch_id, 1);
    }
}
