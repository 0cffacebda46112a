// ==========================================
// Max Import - 字段标准化
// ==========================================
// 职责: 纯函数式的值转换（截断 / 去非数字 / 金额 / 日期）
// 约束: 除日期外均为全函数，永不失败
// ==========================================

use crate::domain::catalog::NormalizeRule;
use crate::domain::types::FieldValue;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

/// 去空白并截断到 max_len 个字符；None/空 → ""
pub fn truncate_string(value: Option<&str>, max_len: usize) -> String {
    match value {
        None => String::new(),
        Some(v) => v.trim().chars().take(max_len).collect(),
    }
}

/// 仅保留 0-9；None → ""
pub fn digits_only(value: Option<&str>) -> String {
    value
        .map(|v| v.chars().filter(|c| c.is_ascii_digit()).collect())
        .unwrap_or_default()
}

/// 金额解析（永不失败，结果必为有限数）
///
/// # 分隔符判定
/// - 同时有 `.` 和 `,`: `.` 为千分位，`,` 为小数点（1.500,50）
/// - 只有 `,`: 小数点（15,83）
/// - 只有 `.`: 多于一个为千分位（1.000.000），否则为小数点（15.83）
pub fn parse_currency(value: Option<&str>) -> f64 {
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => return 0.0,
    };

    let stripped = strip_currency_symbols(raw);

    let has_dot = stripped.contains('.');
    let has_comma = stripped.contains(',');
    let canonical = if has_dot && has_comma {
        stripped.replace('.', "").replace(',', ".")
    } else if has_comma {
        stripped.replace(',', ".")
    } else if has_dot && stripped.matches('.').count() > 1 {
        stripped.replace('.', "")
    } else {
        stripped
    };

    match canonical.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            warn!(value = %raw, "金额无法解析，按 0.0 处理");
            0.0
        }
    }
}

fn strip_currency_symbols(value: &str) -> String {
    let mut s = value.trim().to_string();
    for symbol in ["R$", "r$", "US$", "$", "€", "£"] {
        s = s.replace(symbol, "");
    }
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect()
}

// 日期格式（按年份所在位置分组；%Y 只用于 4 位年份，%y 只用于 2 位年份）
const YEAR_FIRST_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const YEAR_FIRST_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
const COMPACT_DATE_FORMATS: &[&str] = &["%Y%m%d"];
const NO_FORMATS: &[&str] = &[];

const DAY_FIRST_DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];
const DAY_FIRST_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const DAY_FIRST_SHORT_DATETIME_FORMATS: &[&str] = &["%d/%m/%y %H:%M:%S", "%d/%m/%y %H:%M"];
const DAY_FIRST_SHORT_DATE_FORMATS: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"];

const MONTH_FIRST_DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];
const MONTH_FIRST_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y"];
const MONTH_FIRST_SHORT_DATETIME_FORMATS: &[&str] = &["%m/%d/%y %H:%M:%S", "%m/%d/%y %H:%M"];
const MONTH_FIRST_SHORT_DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m-%d-%y", "%m.%d.%y"];

/// 日期部分的年份形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YearShape {
    /// 2025-01-20
    Leading,
    /// 20/01/2025
    Trailing,
    /// 20/01/25
    TrailingShort,
    /// 20250120
    Compact,
}

/// 按日期部分（时间之前）的分段长度判定年份形态
fn year_shape(s: &str) -> Option<YearShape> {
    let date_part = s.split(|c| c == ' ' || c == 'T').next()?;
    let parts: Vec<&str> = date_part.split(|c| c == '-' || c == '/' || c == '.').collect();

    if parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    match parts.as_slice() {
        [compact] if compact.len() == 8 => Some(YearShape::Compact),
        [first, _, _] if first.len() == 4 => Some(YearShape::Leading),
        [_, _, last] if last.len() == 4 => Some(YearShape::Trailing),
        [_, _, last] if last.len() == 2 => Some(YearShape::TrailingShort),
        _ => None,
    }
}

/// 日期解析；无法解析 → None（由调用方决定默认值或丢弃该行）
///
/// 年份在前（ISO）与日序无关；年份在后时 `day_first` 决定 01/02/2025
/// 是 2 月 1 日还是 1 月 2 日。两位年份按 chrono `%y` 规则落到 1970-2069。
pub fn parse_date(value: Option<&str>, day_first: bool) -> Option<NaiveDateTime> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }

    let (datetime_formats, date_formats) = match (year_shape(s)?, day_first) {
        (YearShape::Leading, _) => (YEAR_FIRST_DATETIME_FORMATS, YEAR_FIRST_DATE_FORMATS),
        (YearShape::Compact, _) => (NO_FORMATS, COMPACT_DATE_FORMATS),
        (YearShape::Trailing, true) => (DAY_FIRST_DATETIME_FORMATS, DAY_FIRST_DATE_FORMATS),
        (YearShape::Trailing, false) => (MONTH_FIRST_DATETIME_FORMATS, MONTH_FIRST_DATE_FORMATS),
        (YearShape::TrailingShort, true) => {
            (DAY_FIRST_SHORT_DATETIME_FORMATS, DAY_FIRST_SHORT_DATE_FORMATS)
        }
        (YearShape::TrailingShort, false) => {
            (MONTH_FIRST_SHORT_DATETIME_FORMATS, MONTH_FIRST_SHORT_DATE_FORMATS)
        }
    };

    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in date_formats {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// 解析整数（允许 "42.0" 这类小数部分为零的写法）
pub fn parse_whole_number(value: Option<&str>) -> Option<i64> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Some(v as i64),
        _ => None,
    }
}

/// 按目录规则标准化单个值
pub fn apply_rule(rule: NormalizeRule, raw: Option<&str>, day_first: bool) -> FieldValue {
    match rule {
        NormalizeRule::Text { max_len } => FieldValue::Text(truncate_string(raw, max_len)),
        NormalizeRule::UpperText { max_len } => {
            FieldValue::Text(truncate_string(raw, max_len).to_uppercase())
        }
        NormalizeRule::Digits { max_len } => {
            let digits = digits_only(raw);
            FieldValue::Text(truncate_string(Some(&digits), max_len))
        }
        NormalizeRule::Currency => FieldValue::Real(parse_currency(raw)),
        NormalizeRule::Integer => FieldValue::Integer(parse_whole_number(raw).unwrap_or(0)),
        NormalizeRule::Date => match parse_date(raw, day_first) {
            Some(dt) => FieldValue::DateTime(dt),
            None => FieldValue::Null,
        },
        NormalizeRule::Identifier => match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => FieldValue::Text(s.to_string()),
            None => FieldValue::Null,
        },
    }
}
