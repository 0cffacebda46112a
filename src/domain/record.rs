// ==========================================
// Max Import - 导入过程数据结构
// ==========================================
// 生命周期: 每次导入新建，导入结束即丢弃
// 例外: ReferenceEntry 对应的参考表跨批次累积
// ==========================================

use crate::domain::types::{CohortKind, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// SourceSheet / SourceRow - 源数据（全部为文本）
// ==========================================

/// 源表（第一个工作表）
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceSheet {
    /// 表头（按列顺序）
    pub headers: Vec<String>,
    /// 数据行
    pub rows: Vec<SourceRow>,
}

/// 源数据行，单元格与表头按位置对齐
#[derive(Debug, Clone, Serialize)]
pub struct SourceRow {
    /// 行号（表头为第 1 行，数据从第 2 行开始）
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl SourceRow {
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(|s| s.as_str())
    }

    /// 全部单元格为空白
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

impl SourceSheet {
    pub fn header_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

// ==========================================
// ColumnMapping - 字段键 → 源列名
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<String, String>);

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field_key: impl Into<String>, column: impl Into<String>) {
        self.0.insert(field_key.into(), column.into());
    }

    /// 字段对应的源列（未映射 → None）
    pub fn column_for(&self, field_key: &str) -> Option<&str> {
        self.0
            .get(field_key)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// 以 other 中的条目覆盖当前映射（人工复核结果）
    pub fn overridden_by(mut self, other: &ColumnMapping) -> Self {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = ColumnMapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

// ==========================================
// NormalizedRecord - 单表标准化记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// 来源行号
    pub source_row: usize,
    /// 源数据中的原始标识（未解析）
    pub raw_identifier: Option<String>,
    /// 列名 → 值（保持插入顺序）
    values: Vec<(String, FieldValue)>,
}

impl NormalizedRecord {
    pub fn new(source_row: usize) -> Self {
        Self {
            source_row,
            raw_identifier: None,
            values: Vec::new(),
        }
    }

    /// 设置列值（已存在则覆盖）
    pub fn set(&mut self, column: &str, value: FieldValue) {
        match self.values.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        let pos = self.values.iter().position(|(c, _)| c == column)?;
        Some(self.values.remove(pos).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.values.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ==========================================
// ProductRow - 商品主表 + 门店关联表（同一源行）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub master: NormalizedRecord,
    pub branch: NormalizedRecord,
}

// ==========================================
// Identified - 可参与标识分组的记录
// ==========================================
pub trait Identified {
    fn source_row(&self) -> usize;
    fn raw_identifier(&self) -> Option<&str>;
    /// 写入保留的外部标识
    fn assign_identifier(&mut self, column: &str, id: i64);
}

impl Identified for NormalizedRecord {
    fn source_row(&self) -> usize {
        self.source_row
    }

    fn raw_identifier(&self) -> Option<&str> {
        self.raw_identifier.as_deref()
    }

    fn assign_identifier(&mut self, column: &str, id: i64) {
        self.set(column, FieldValue::Integer(id));
    }
}

impl Identified for ProductRow {
    fn source_row(&self) -> usize {
        self.master.source_row
    }

    fn raw_identifier(&self) -> Option<&str> {
        self.master.raw_identifier.as_deref()
    }

    fn assign_identifier(&mut self, column: &str, id: i64) {
        self.master.set(column, FieldValue::Integer(id));
        self.branch.set(column, FieldValue::Integer(id));
    }
}

// ==========================================
// IdentityCohort - 标识分组
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityCohort<T = NormalizedRecord> {
    pub kind: CohortKind,
    pub records: Vec<T>,
}

impl<T> IdentityCohort<T> {
    pub fn new(kind: CohortKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ==========================================
// ReferenceEntry - 分类编码参考项
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// 业务键（NCM 编码）
    pub code: String,
    /// 代理键
    pub key: i64,
}
