//! Filter expression - OR of field conditions / 过滤表达式
//!
//! The same expression is evaluated in memory (`matches`) and rendered to a
//! SQLite `WHERE` clause (`push_where`), so both paths share one definition.

use sqlx::{QueryBuilder, Sqlite};

use crate::models::ServiceRecord;

/// Maximum number of records a search returns / 单次搜索最多返回条数
pub const MAX_RESULTS: usize = 100;

/// Record fields a condition can target / 可过滤的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PlaceOfService,
    TypeOfService,
    AllowedChargesPerPerson,
}

impl Field {
    pub fn column(&self) -> &'static str {
        match self {
            Field::PlaceOfService => "place_of_service",
            Field::TypeOfService => "type_of_service",
            Field::AllowedChargesPerPerson => "allowed_charges_per_person",
        }
    }

    /// Lower-cased copy of a text column, filled on insert / 小写副本列
    ///
    /// SQLite's `lower()` and `LIKE` only fold ASCII, so text matching runs on
    /// values folded with `str::to_lowercase`, same as `matches`.
    pub fn folded_column(&self) -> Option<&'static str> {
        match self {
            Field::PlaceOfService => Some("place_of_service_lower"),
            Field::TypeOfService => Some("type_of_service_lower"),
            Field::AllowedChargesPerPerson => None,
        }
    }

    fn text<'a>(&self, record: &'a ServiceRecord) -> Option<&'a str> {
        match self {
            Field::PlaceOfService => Some(&record.place_of_service),
            Field::TypeOfService => Some(&record.type_of_service),
            Field::AllowedChargesPerPerson => None,
        }
    }

    fn number(&self, record: &ServiceRecord) -> Option<f64> {
        match self {
            Field::AllowedChargesPerPerson => Some(record.allowed_charges_per_person),
            _ => None,
        }
    }
}

/// Single field condition / 单个字段条件
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive substring match / 忽略大小写的子串匹配
    Contains { field: Field, pattern: String },
    /// Inclusive on both ends / 闭区间
    Between { field: Field, low: f64, high: f64 },
    AtMost { field: Field, value: f64 },
    AtLeast { field: Field, value: f64 },
    Equals { field: Field, value: f64 },
}

impl Condition {
    pub fn contains(field: Field, pattern: &str) -> Self {
        Condition::Contains { field, pattern: pattern.to_lowercase() }
    }

    /// Symmetric window of `fraction * value` around `value` / 容差窗口
    pub fn tolerance(field: Field, value: f64, fraction: f64) -> Self {
        let tolerance = value * fraction;
        Condition::Between {
            field,
            low: value - tolerance,
            high: value + tolerance,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Condition::Contains { .. })
    }

    pub fn matches(&self, record: &ServiceRecord) -> bool {
        match self {
            Condition::Contains { field, pattern } => field
                .text(record)
                .map(|text| text.to_lowercase().contains(pattern.as_str()))
                .unwrap_or(false),
            Condition::Between { field, low, high } => field
                .number(record)
                .map(|n| n >= *low && n <= *high)
                .unwrap_or(false),
            Condition::AtMost { field, value } => {
                field.number(record).map(|n| n <= *value).unwrap_or(false)
            }
            Condition::AtLeast { field, value } => {
                field.number(record).map(|n| n >= *value).unwrap_or(false)
            }
            Condition::Equals { field, value } => {
                field.number(record).map(|n| n == *value).unwrap_or(false)
            }
        }
    }

    fn push_sql(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Condition::Contains { field, pattern } => {
                match field.folded_column() {
                    Some(column) => {
                        qb.push(column)
                            .push(" LIKE ")
                            .push_bind(format!("%{}%", escape_like(pattern)))
                            .push(" ESCAPE '\\'");
                    }
                    None => {
                        qb.push("0");
                    }
                }
            }
            Condition::Between { field, low, high } => {
                qb.push(field.column())
                    .push(" BETWEEN ")
                    .push_bind(*low)
                    .push(" AND ")
                    .push_bind(*high);
            }
            Condition::AtMost { field, value } => {
                qb.push(field.column()).push(" <= ").push_bind(*value);
            }
            Condition::AtLeast { field, value } => {
                qb.push(field.column()).push(" >= ").push_bind(*value);
            }
            Condition::Equals { field, value } => {
                qb.push(field.column()).push(" = ").push_bind(*value);
            }
        }
    }
}

/// OR of conditions with a result cap / 条件的“或”组合
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpression {
    any_of: Vec<Condition>,
    limit: usize,
}

impl FilterExpression {
    pub fn any_of(conditions: Vec<Condition>) -> Self {
        Self {
            any_of: conditions,
            limit: MAX_RESULTS,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.any_of
    }

    pub fn numeric_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.any_of.iter().filter(|c| c.is_numeric())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn matches(&self, record: &ServiceRecord) -> bool {
        self.any_of.iter().any(|c| c.matches(record))
    }

    /// Append ` WHERE (...) OR (...)` to a query / 追加 WHERE 子句
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE ");
        if self.any_of.is_empty() {
            qb.push("0");
            return;
        }
        for (i, condition) in self.any_of.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(");
            condition.push_sql(qb);
            qb.push(")");
        }
    }
}

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
