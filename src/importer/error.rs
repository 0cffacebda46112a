// ==========================================
// Max Import - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级问题（跳过）与参考编码创建失败不属于错误，
//       以数据形式记录在 ImportReport 中
// ==========================================

use crate::domain::report::ImportReport;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误（任何写入之前中止） =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 映射错误（该实体导入在写入前中止） =====
    #[error("必填字段未映射 ({family}): {}", fields.join(", "))]
    MappingIncomplete { family: String, fields: Vec<String> },

    #[error("目标表结构不匹配 (表 {table}): 缺少列 {column}")]
    SchemaMismatch { table: String, column: String },

    #[error("约束闸门无法启用: {0}")]
    ConstraintGateError(String),

    // ===== 写入错误（该表事务已回滚） =====
    #[error("批量写入失败 (表 {table}, {rows} 行): {message}")]
    BulkInsertFailure {
        table: String,
        rows: usize,
        message: String,
    },

    /// 写入阶段中途失败；report 记录此前已提交的表
    #[error("导入中途失败 (已提交 {} 批写入): {message}", report.loads.len())]
    LoadInterrupted {
        report: Box<ImportReport>,
        message: String,
    },

    // ===== 数据库错误 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否发生在任何写入之前
    pub fn is_pre_write(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::FileReadError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::CsvParseError(_)
                | ImportError::MappingIncomplete { .. }
                | ImportError::SchemaMismatch { .. }
                | ImportError::ConstraintGateError(_)
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::BulkInsertFailure {
                table,
                rows,
                message,
            } => ImportError::BulkInsertFailure {
                table,
                rows,
                message,
            },
            RepositoryError::SchemaMismatch { table, column } => {
                ImportError::SchemaMismatch { table, column }
            }
            RepositoryError::ConstraintGateError(message) => {
                ImportError::ConstraintGateError(message)
            }
            other => ImportError::DatabaseQueryError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_incomplete_message() {
        let err = ImportError::MappingIncomplete {
            family: "customer".into(),
            fields: vec!["cliNome".into(), "cliId".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("customer"));
        assert!(msg.contains("cliNome, cliId"));
        assert!(err.is_pre_write());
    }

    #[test]
    fn test_from_repository_bulk_failure() {
        let err: ImportError = RepositoryError::BulkInsertFailure {
            table: "produto".into(),
            rows: 10,
            message: "UNIQUE constraint failed".into(),
        }
        .into();

        match err {
            ImportError::BulkInsertFailure { table, rows, .. } => {
                assert_eq!(table, "produto");
                assert_eq!(rows, 10);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_load_interrupted_carries_report() {
        let mut report = ImportReport::new("r1", crate::domain::types::EntityFamily::Product);
        report.record_load("produto", None, 3);

        let err = ImportError::LoadInterrupted {
            report: Box::new(report),
            message: "no such table: ncm".into(),
        };
        assert!(!err.is_pre_write());
        assert!(err.to_string().contains("no such table: ncm"));
        match err {
            ImportError::LoadInterrupted { report, .. } => assert_eq!(report.rows_loaded("produto"), 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_gate_error_is_pre_write() {
        let err: ImportError = RepositoryError::ConstraintGateError("foreign_keys".into()).into();
        assert!(matches!(err, ImportError::ConstraintGateError(_)));
        assert!(err.is_pre_write());
    }
}
