use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::ServiceRecord;
use crate::search::translate;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// Free-text catalog search / 目录搜索
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ServiceRecord>>, AppError> {
    let text = query.search.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }

    let filter = translate(&text);
    let records = state.records.find(&filter).await?;
    tracing::debug!("Search {:?} matched {} records", text, records.len());

    Ok(Json(records))
}
