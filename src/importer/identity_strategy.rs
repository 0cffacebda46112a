// ==========================================
// Max Import - 标识分组策略
// ==========================================
// 规则:
// - 原始标识可解析为正整数 → 固定分组（显式写入该值）
// - 缺失 / 非数字 / 零 / 负数 → 自动分组（由库分配）
// 注: 分组内唯一性不在此校验，冲突由批量写入失败暴露
// ==========================================

use crate::config::constants::RESERVED_ADMIN_ID;
use crate::domain::record::{IdentityCohort, Identified};
use crate::domain::report::{SkipReason, SkippedRow};
use crate::domain::types::{CohortKind, EntityFamily};
use crate::importer::field_normalizer::parse_whole_number;
use tracing::warn;

/// 标识保留策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// 保留正整数标识
    Preserve,
    /// 保留正整数标识，但保留标识（管理员）整行丢弃
    PreserveExceptReserved,
    /// 始终由库分配
    AlwaysAuto,
}

impl IdentityPolicy {
    pub fn for_family(family: EntityFamily) -> Self {
        match family {
            EntityFamily::Product => IdentityPolicy::Preserve,
            EntityFamily::Customer => IdentityPolicy::PreserveExceptReserved,
            EntityFamily::Supplier | EntityFamily::Financial => IdentityPolicy::AlwaysAuto,
        }
    }
}

/// 解析原始标识：仅正整数有效
pub fn parse_identifier(raw: Option<&str>) -> Option<i64> {
    parse_whole_number(raw).filter(|id| *id > 0)
}

/// 分组结果
#[derive(Debug, Clone)]
pub struct CohortSplit<T> {
    pub fixed: IdentityCohort<T>,
    pub auto: IdentityCohort<T>,
    pub skipped: Vec<SkippedRow>,
    pub warnings: Vec<String>,
}

/// 按策略拆分批次；固定分组的记录会写入标识列
pub fn split_cohorts<T: Identified>(
    records: Vec<T>,
    id_column: &str,
    policy: IdentityPolicy,
) -> CohortSplit<T> {
    let mut split = CohortSplit {
        fixed: IdentityCohort::new(CohortKind::Fixed),
        auto: IdentityCohort::new(CohortKind::Auto),
        skipped: Vec::new(),
        warnings: Vec::new(),
    };

    for mut record in records {
        let id = match policy {
            IdentityPolicy::AlwaysAuto => None,
            _ => parse_identifier(record.raw_identifier()),
        };

        match id {
            Some(id) if policy == IdentityPolicy::PreserveExceptReserved && id == RESERVED_ADMIN_ID => {
                let row = record.source_row();
                warn!(row, id, "标识为系统保留值，丢弃该行");
                split.warnings.push(format!("第 {} 行: 标识 {} 为系统保留，已跳过", row, id));
                split.skipped.push(SkippedRow {
                    row_number: row,
                    reason: SkipReason::ReservedIdentifier,
                });
            }
            Some(id) => {
                record.assign_identifier(id_column, id);
                split.fixed.records.push(record);
            }
            None => split.auto.records.push(record),
        }
    }

    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::NormalizedRecord;
    use crate::domain::types::FieldValue;

    fn record(row: usize, raw: Option<&str>) -> NormalizedRecord {
        let mut r = NormalizedRecord::new(row);
        r.raw_identifier = raw.map(str::to_string);
        r.set("cliNome", FieldValue::Text(format!("linha {}", row)));
        r
    }

    #[test]
    fn test_parse_identifier() {
        assert_eq!(parse_identifier(Some("42")), Some(42));
        assert_eq!(parse_identifier(Some("42.0")), Some(42));
        assert_eq!(parse_identifier(Some("ABC")), None);
        assert_eq!(parse_identifier(Some("")), None);
        assert_eq!(parse_identifier(Some("-3")), None);
        assert_eq!(parse_identifier(Some("0")), None);
        assert_eq!(parse_identifier(None), None);
    }

    #[test]
    fn test_split_preserve() {
        let records = vec![
            record(2, Some("42")),
            record(3, Some("ABC")),
            record(4, Some("")),
            record(5, Some("-3")),
            record(6, None),
        ];

        let split = split_cohorts(records, "proId", IdentityPolicy::Preserve);
        assert_eq!(split.fixed.len(), 1);
        assert_eq!(split.fixed.records[0].get("proId"), Some(&FieldValue::Integer(42)));
        assert_eq!(split.auto.len(), 4);
        assert!(split.auto.records.iter().all(|r| r.get("proId").is_none()));
        assert!(split.skipped.is_empty());
    }

    #[test]
    fn test_customer_reserved_id_dropped() {
        let records = vec![record(2, Some("1")), record(3, Some("2"))];

        let split = split_cohorts(records, "cliId", IdentityPolicy::PreserveExceptReserved);
        assert_eq!(split.fixed.len(), 1);
        assert_eq!(split.fixed.records[0].get("cliId"), Some(&FieldValue::Integer(2)));
        assert!(split.auto.is_empty());
        assert_eq!(split.skipped[0].reason, SkipReason::ReservedIdentifier);
        assert_eq!(split.skipped[0].row_number, 2);
        assert_eq!(split.warnings.len(), 1);
    }

    #[test]
    fn test_supplier_always_auto() {
        let records = vec![record(2, Some("1")), record(3, Some("99"))];

        let split = split_cohorts(
            records,
            "cliId",
            IdentityPolicy::for_family(EntityFamily::Supplier),
        );
        assert!(split.fixed.is_empty());
        assert_eq!(split.auto.len(), 2);
        assert!(split.skipped.is_empty());
    }
}
