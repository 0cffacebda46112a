// ==========================================
// Max Import - 领域基础类型
// ==========================================

use crate::config::constants::tables;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// EntityFamily - 实体族
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFamily {
    Product,
    Customer,
    Supplier,
    Financial,
}

impl EntityFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityFamily::Product => "product",
            EntityFamily::Customer => "customer",
            EntityFamily::Supplier => "supplier",
            EntityFamily::Financial => "financial",
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "product" | "products" | "produto" | "produtos" => Ok(EntityFamily::Product),
            "customer" | "customers" | "cliente" | "clientes" => Ok(EntityFamily::Customer),
            "supplier" | "suppliers" | "fornecedor" | "fornecedores" => Ok(EntityFamily::Supplier),
            "financial" | "financeiro" => Ok(EntityFamily::Financial),
            other => Err(format!("未知实体族: {}", other)),
        }
    }
}

// ==========================================
// DestTable - 目标表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestTable {
    /// produto
    Product,
    /// produto_empresa
    ProductBranch,
    /// cliente
    Customer,
    /// financeiro
    Ledger,
}

impl DestTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            DestTable::Product => tables::PRODUCT,
            DestTable::ProductBranch => tables::PRODUCT_BRANCH,
            DestTable::Customer => tables::CUSTOMER,
            DestTable::Ledger => tables::LEDGER,
        }
    }
}

// ==========================================
// CohortKind - 标识分组
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CohortKind {
    /// 保留外部标识（显式写入 ID）
    Fixed,
    /// 由库分配标识
    Auto,
}

// ==========================================
// FieldValue - 标准化后的字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Real(f64),
    Integer(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            FieldValue::Real(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Text(s) => ToSqlOutput::from(s.as_str()),
            FieldValue::Real(v) => ToSqlOutput::from(*v),
            FieldValue::Integer(v) => ToSqlOutput::from(*v),
            // 与遗留库一致：日期以 ISO 文本存储
            FieldValue::Date(d) => ToSqlOutput::Owned(Value::Text(d.format("%Y-%m-%d").to_string())),
            FieldValue::DateTime(dt) => {
                ToSqlOutput::Owned(Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
            }
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}
