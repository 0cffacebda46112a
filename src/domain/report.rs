// ==========================================
// Max Import - 导入报告
// ==========================================
// 区分两类结果:
// - 跳过（软）: 行级问题，导入继续
// - 中止（硬）: 表级失败，该表不再写入
// ==========================================

use crate::domain::types::{CohortKind, EntityFamily};
use crate::i18n::t_with_args;
use serde::Serialize;
use std::collections::BTreeMap;

/// 行被跳过的原因
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SkipReason {
    /// 必填字段为空
    MissingRequired(String),
    /// 关联客户标识无效（≤ 0 或缺失）
    InvalidLink,
    /// 到期日无法解析
    InvalidDueDate,
    /// 保留标识（系统/管理员）
    ReservedIdentifier,
}

impl SkipReason {
    fn i18n_key(&self) -> &'static str {
        match self {
            SkipReason::MissingRequired(_) => "report.skip.missing_required",
            SkipReason::InvalidLink => "report.skip.invalid_link",
            SkipReason::InvalidDueDate => "report.skip.invalid_due_date",
            SkipReason::ReservedIdentifier => "report.skip.reserved_identifier",
        }
    }
}

/// 被跳过的行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub reason: SkipReason,
}

/// 参考编码创建失败
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceFailure {
    pub code: String,
    pub message: String,
}

/// 单次批量写入结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub cohort: Option<CohortKind>,
    pub rows: usize,
}

/// 中止信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbortedLoad {
    pub table: String,
    pub rows_attempted: usize,
    pub message: String,
}

/// 导入报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub run_id: String,
    pub family: EntityFamily,
    /// 源数据行数（不含空行）
    pub total_rows: usize,
    /// 导入前清空（表 → 删除行数），已提交
    pub cleared: Vec<(String, usize)>,
    pub loads: Vec<TableLoad>,
    pub skipped: Vec<SkippedRow>,
    pub reference_failures: Vec<ReferenceFailure>,
    pub warnings: Vec<String>,
    pub aborted: Option<AbortedLoad>,
    pub elapsed_ms: u128,
}

impl ImportReport {
    pub fn new(run_id: impl Into<String>, family: EntityFamily) -> Self {
        Self {
            run_id: run_id.into(),
            family,
            total_rows: 0,
            cleared: Vec::new(),
            loads: Vec::new(),
            skipped: Vec::new(),
            reference_failures: Vec::new(),
            warnings: Vec::new(),
            aborted: None,
            elapsed_ms: 0,
        }
    }

    pub fn skip(&mut self, row_number: usize, reason: SkipReason) {
        self.skipped.push(SkippedRow { row_number, reason });
    }

    pub fn record_load(&mut self, table: &str, cohort: Option<CohortKind>, rows: usize) {
        if rows == 0 {
            return;
        }
        self.loads.push(TableLoad {
            table: table.to_string(),
            cohort,
            rows,
        });
    }

    /// 表已写入行数
    pub fn rows_loaded(&self, table: &str) -> usize {
        self.loads
            .iter()
            .filter(|l| l.table == table)
            .map(|l| l.rows)
            .sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// 跳过原因 → 次数
    pub fn skip_counts(&self) -> BTreeMap<SkipReason, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.skipped {
            *counts.entry(row.reason.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// 面向用户的摘要（多语言）
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for (table, rows) in &self.cleared {
            let rows = rows.to_string();
            lines.push(t_with_args(
                "report.cleared",
                &[("table", table.as_str()), ("rows", rows.as_str())],
            ));
        }

        for load in &self.loads {
            let rows = load.rows.to_string();
            lines.push(t_with_args(
                "report.loaded",
                &[("table", load.table.as_str()), ("rows", rows.as_str())],
            ));
        }

        for (reason, count) in self.skip_counts() {
            let count = count.to_string();
            let field = match &reason {
                SkipReason::MissingRequired(field) => field.clone(),
                _ => String::new(),
            };
            lines.push(t_with_args(
                reason.i18n_key(),
                &[("count", count.as_str()), ("field", field.as_str())],
            ));
        }

        for failure in &self.reference_failures {
            lines.push(t_with_args(
                "report.reference_failed",
                &[("code", failure.code.as_str())],
            ));
        }

        match &self.aborted {
            Some(aborted) => {
                let rows = aborted.rows_attempted.to_string();
                lines.push(t_with_args(
                    "report.aborted",
                    &[
                        ("table", aborted.table.as_str()),
                        ("rows", rows.as_str()),
                        ("message", aborted.message.as_str()),
                    ],
                ));
            }
            None => {
                let family = self.family.as_str();
                lines.push(t_with_args("report.completed", &[("family", family)]));
            }
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_counts_grouped() {
        let mut report = ImportReport::new("r1", EntityFamily::Financial);
        report.skip(2, SkipReason::InvalidLink);
        report.skip(3, SkipReason::InvalidDueDate);
        report.skip(5, SkipReason::InvalidLink);

        let counts = report.skip_counts();
        assert_eq!(counts.get(&SkipReason::InvalidLink), Some(&2));
        assert_eq!(counts.get(&SkipReason::InvalidDueDate), Some(&1));
        assert_eq!(report.skipped_count(), 3);
    }

    #[test]
    fn test_rows_loaded_sums_cohorts() {
        let mut report = ImportReport::new("r1", EntityFamily::Product);
        report.record_load("produto", Some(CohortKind::Fixed), 2);
        report.record_load("produto", Some(CohortKind::Auto), 1);
        report.record_load("produto_empresa", None, 0);

        assert_eq!(report.rows_loaded("produto"), 3);
        assert_eq!(report.rows_loaded("produto_empresa"), 0);
        assert_eq!(report.loads.len(), 2);
    }

    #[test]
    fn test_summary_distinguishes_abort() {
        let mut report = ImportReport::new("r1", EntityFamily::Customer);
        report.skip(4, SkipReason::MissingRequired("cliNome".into()));
        assert!(!report.is_aborted());
        let completed = report.summary_lines();

        report.aborted = Some(AbortedLoad {
            table: "cliente".into(),
            rows_attempted: 10,
            message: "UNIQUE".into(),
        });
        let aborted = report.summary_lines();

        assert_eq!(completed.len(), aborted.len());
        assert_ne!(completed.last(), aborted.last());
    }

    #[test]
    fn test_summary_lists_cleared_tables_first() {
        let mut report = ImportReport::new("r1", EntityFamily::Product);
        report.cleared = vec![("produto".into(), 3)];
        report.record_load("produto", Some(CohortKind::Fixed), 2);

        let lines = report.summary_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("produto") && lines[0].contains('3'));
        assert!(lines[1].contains('2'));
    }
}
