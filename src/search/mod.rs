//! Search module - query translation and record lookup / 搜索模块
//!
//! Call direction: handler → translator → store (unidirectional) / 调用方向
//! - `translator`: free text → `ParsedIntent` → `FilterExpression`
//! - `filter`: OR of field conditions, evaluated in memory or rendered to SQL
//! - `store`: runs a filter against `service_records`, at most `MAX_RESULTS` rows

pub mod filter;
pub mod store;
pub mod translator;

pub use filter::{Condition, Field, FilterExpression, MAX_RESULTS};
pub use store::RecordStore;
pub use translator::{parse, translate, ParsedIntent, RangeKind};
