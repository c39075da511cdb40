//! Free-text query → filter expression / 自由文本查询转换为过滤表达式
//!
//! A query always matches place/type of service as a substring. If it also
//! carries a usable amount, one numeric clause (two for exact amounts) is OR'd in:
//!
//! - `1k-2k`, `100-200`        → range between the two numbers
//! - `up to 200`, `100 to 200` → range marker but no number pair: ±50% around the first number
//! - `< 300`, `less than 300`  → charge ≤ value
//! - `> 2m`, `greater than 2m` → charge ≥ value
//! - `500`                     → ±10% window, or exactly the value
//!
//! The `k`/`m` multiplier is decided from the whole query, not the number token,
//! so a query such as "mri 500" is read as 500 million.

use once_cell::sync::Lazy;
use regex::Regex;

use super::filter::{Condition, Field, FilterExpression};

/// First run of digits, commas and dots / 第一个数字串
static NUMERIC_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d,.]+").unwrap());

/// Leading decimal of a comma-stripped run / 数字前缀
static LEADING_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+(\.\d*)?|\.\d+)").unwrap());

/// Two numbers separated by whitespace, commas or a hyphen / 区间的两个数字
static RANGE_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*[kKmM]?[\s,\-]+(\d[\d,]*(?:\.\d+)?)").unwrap()
});

const EXACT_TOLERANCE: f64 = 0.1;
const RANGE_FALLBACK_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Exact,
    Range,
    LessThan,
    GreaterThan,
}

/// Classified query, lives for one translation / 解析后的查询意图
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIntent {
    pub text_pattern: String,
    /// Present only when finite and > 0 / 仅在有限且大于零时存在
    pub numeric_value: Option<f64>,
    pub range_kind: RangeKind,
    /// Ascending, only for `RangeKind::Range` / 升序区间
    pub range_bounds: Option<(f64, f64)>,
}

pub fn parse(query: &str) -> ParsedIntent {
    let text_pattern = query.trim().to_string();
    let lower = text_pattern.to_lowercase();
    let multiplier = multiplier(&lower);

    let numeric_value = NUMERIC_RUN
        .find(&text_pattern)
        .and_then(|m| parse_decimal(m.as_str()))
        .map(|n| n * multiplier)
        .filter(|n| n.is_finite() && *n > 0.0);

    let range_kind = if numeric_value.is_some() {
        classify(&lower)
    } else {
        RangeKind::Exact
    };

    let range_bounds = match range_kind {
        RangeKind::Range => range_pair(&text_pattern, multiplier),
        _ => None,
    };

    ParsedIntent {
        text_pattern,
        numeric_value,
        range_kind,
        range_bounds,
    }
}

pub fn translate(query: &str) -> FilterExpression {
    build_filter(&parse(query))
}

pub fn build_filter(intent: &ParsedIntent) -> FilterExpression {
    let charge = Field::AllowedChargesPerPerson;
    let mut conditions = vec![
        Condition::contains(Field::PlaceOfService, &intent.text_pattern),
        Condition::contains(Field::TypeOfService, &intent.text_pattern),
    ];

    if let Some(value) = intent.numeric_value {
        match intent.range_kind {
            RangeKind::Range => match intent.range_bounds {
                Some((low, high)) => conditions.push(Condition::Between { field: charge, low, high }),
                None => conditions.push(Condition::tolerance(charge, value, RANGE_FALLBACK_TOLERANCE)),
            },
            RangeKind::LessThan => conditions.push(Condition::AtMost { field: charge, value }),
            RangeKind::GreaterThan => conditions.push(Condition::AtLeast { field: charge, value }),
            RangeKind::Exact => {
                conditions.push(Condition::tolerance(charge, value, EXACT_TOLERANCE));
                conditions.push(Condition::Equals { field: charge, value });
            }
        }
    }

    FilterExpression::any_of(conditions)
}

/// `k` wins over `m` when both appear / 同时出现时 k 优先
fn multiplier(lower: &str) -> f64 {
    if lower.contains('k') {
        1_000.0
    } else if lower.contains('m') {
        1_000_000.0
    } else {
        1.0
    }
}

fn classify(lower: &str) -> RangeKind {
    if lower.contains('-') || lower.contains("to") {
        RangeKind::Range
    } else if lower.contains('<') || lower.contains("less than") {
        RangeKind::LessThan
    } else if lower.contains('>') || lower.contains("greater than") {
        RangeKind::GreaterThan
    } else {
        RangeKind::Exact
    }
}

fn parse_decimal(token: &str) -> Option<f64> {
    let stripped = token.replace(',', "");
    LEADING_DECIMAL
        .find(&stripped)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn range_pair(query: &str, multiplier: f64) -> Option<(f64, f64)> {
    let caps = RANGE_PAIR.captures(query)?;
    let first = parse_decimal(caps.get(1)?.as_str())? * multiplier;
    let second = parse_decimal(caps.get(2)?.as_str())? * multiplier;
    Some((first.min(second), first.max(second)))
}
