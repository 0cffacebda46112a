// ==========================================
// Max Import - 分类编码同步（NCM）
// ==========================================
// 流程（两遍查找或创建）:
// 1. 收集批次中不重复的非空编码
// 2. 查询已存在的编码
// 3. 逐个创建缺失编码（单个失败记录后继续）
// 4. 重新查询，得到包含新建键的完整映射
// 5. 回填到主表记录，未解析 → 中性键 0
// 注: 不加锁，前提是同一库同一时刻只有一个导入
// ==========================================

use crate::config::constants::NEUTRAL_REFERENCE_KEY;
use crate::domain::record::{NormalizedRecord, ReferenceEntry};
use crate::domain::report::ReferenceFailure;
use crate::domain::types::FieldValue;
use crate::repository::error::RepositoryResult;
use crate::repository::reference_repo::ReferenceRepository;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// 主表中编码所在列
pub const CODE_COLUMN: &str = "zzz_proCodigoNcm";
/// 主表中代理键所在列
pub const KEY_COLUMN: &str = "ncmId";

/// 同步结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSyncOutcome {
    /// 本次新建的编码
    pub created: Vec<ReferenceEntry>,
    pub failures: Vec<ReferenceFailure>,
    /// 编码 → 代理键（完整映射）
    pub mapping: HashMap<String, i64>,
}

pub struct ReferenceSynchronizer<'r, R: ReferenceRepository> {
    repo: &'r R,
}

impl<'r, R: ReferenceRepository> ReferenceSynchronizer<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    /// 同步并回填（仅查询失败时返回错误；单个编码创建失败不算错误）
    pub fn synchronize<'a, I>(&self, masters: I) -> RepositoryResult<ReferenceSyncOutcome>
    where
        I: IntoIterator<Item = &'a mut NormalizedRecord>,
    {
        let mut masters: Vec<&'a mut NormalizedRecord> = masters.into_iter().collect();

        let codes: Vec<String> = masters
            .iter()
            .filter_map(|r| code_of(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut outcome = ReferenceSyncOutcome::default();
        if codes.is_empty() {
            return Ok(outcome);
        }

        let existing: BTreeSet<String> = self
            .repo
            .find_existing(&codes)?
            .into_iter()
            .map(|e| e.code)
            .collect();
        let missing: Vec<&String> = codes.iter().filter(|c| !existing.contains(*c)).collect();
        debug!(codes = codes.len(), missing = missing.len(), "编码比对完成");

        for code in missing {
            match self.repo.create(code) {
                Ok(key) => outcome.created.push(ReferenceEntry {
                    code: code.clone(),
                    key,
                }),
                Err(e) => {
                    warn!(code = %code, error = %e, "编码创建失败，使用中性键");
                    outcome.failures.push(ReferenceFailure {
                        code: code.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // 第二遍读取：观察刚创建的键
        outcome.mapping = self
            .repo
            .find_existing(&codes)?
            .into_iter()
            .map(|e| (e.code, e.key))
            .collect();

        for record in masters.iter_mut() {
            let key = code_of(record)
                .and_then(|c| outcome.mapping.get(&c).copied())
                .unwrap_or(NEUTRAL_REFERENCE_KEY);
            record.set(KEY_COLUMN, FieldValue::Integer(key));
        }

        info!(
            codes = codes.len(),
            created = outcome.created.len(),
            failed = outcome.failures.len(),
            "分类编码同步完成"
        );
        Ok(outcome)
    }
}

fn code_of(record: &NormalizedRecord) -> Option<String> {
    record
        .get(CODE_COLUMN)
        .and_then(FieldValue::as_text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::error::RepositoryError;
    use std::cell::RefCell;

    /// 内存参考表，可指定创建失败的编码
    struct FakeRepository {
        rows: RefCell<Vec<ReferenceEntry>>,
        fail_on: Option<&'static str>,
        create_calls: RefCell<Vec<String>>,
    }

    impl FakeRepository {
        fn with(existing: &[(&str, i64)], fail_on: Option<&'static str>) -> Self {
            Self {
                rows: RefCell::new(
                    existing
                        .iter()
                        .map(|(c, k)| ReferenceEntry {
                            code: c.to_string(),
                            key: *k,
                        })
                        .collect(),
                ),
                fail_on,
                create_calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ReferenceRepository for FakeRepository {
        fn find_existing(&self, codes: &[String]) -> RepositoryResult<Vec<ReferenceEntry>> {
            Ok(self
                .rows
                .borrow()
                .iter()
                .filter(|e| codes.contains(&e.code))
                .cloned()
                .collect())
        }

        fn create(&self, code: &str) -> RepositoryResult<i64> {
            self.create_calls.borrow_mut().push(code.to_string());
            if self.fail_on == Some(code) {
                return Err(RepositoryError::DatabaseQueryError("falha simulada".into()));
            }
            let key = self.rows.borrow().len() as i64 + 100;
            self.rows.borrow_mut().push(ReferenceEntry {
                code: code.to_string(),
                key,
            });
            Ok(key)
        }
    }

    fn master(row: usize, code: &str) -> NormalizedRecord {
        let mut r = NormalizedRecord::new(row);
        r.set(CODE_COLUMN, FieldValue::Text(code.to_string()));
        r.set(KEY_COLUMN, FieldValue::Integer(NEUTRAL_REFERENCE_KEY));
        r
    }

    #[test]
    fn test_creates_only_missing_codes() {
        let repo = FakeRepository::with(&[("1234", 7)], None);
        let mut records = vec![master(2, "1234"), master(3, "5678"), master(4, "1234")];

        let outcome = ReferenceSynchronizer::new(&repo)
            .synchronize(records.iter_mut())
            .unwrap();

        assert_eq!(*repo.create_calls.borrow(), vec!["5678".to_string()]);
        assert_eq!(outcome.mapping.len(), 2);
        assert_eq!(outcome.mapping["1234"], 7);
        assert!(outcome.failures.is_empty());

        assert_eq!(records[0].get(KEY_COLUMN), Some(&FieldValue::Integer(7)));
        assert_eq!(records[2].get(KEY_COLUMN), Some(&FieldValue::Integer(7)));
        let created = outcome.mapping["5678"];
        assert_eq!(records[1].get(KEY_COLUMN), Some(&FieldValue::Integer(created)));
    }

    #[test]
    fn test_failed_creation_maps_to_neutral_key() {
        let repo = FakeRepository::with(&[], Some("1111"));
        let mut records = vec![master(2, "1111"), master(3, "2222")];

        let outcome = ReferenceSynchronizer::new(&repo)
            .synchronize(records.iter_mut())
            .unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].code, "1111");
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(records[0].get(KEY_COLUMN), Some(&FieldValue::Integer(0)));
        assert_ne!(records[1].get(KEY_COLUMN), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_empty_codes_untouched() {
        let repo = FakeRepository::with(&[], None);
        let mut records = vec![master(2, ""), master(3, "  ")];

        let outcome = ReferenceSynchronizer::new(&repo)
            .synchronize(records.iter_mut())
            .unwrap();

        assert!(repo.create_calls.borrow().is_empty());
        assert!(outcome.mapping.is_empty());
        assert_eq!(records[0].get(KEY_COLUMN), Some(&FieldValue::Integer(0)));
    }
}
