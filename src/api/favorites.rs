use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::AppError;
use crate::favorites::Favorite;
use crate::state::AppState;

const MISSING_DATA: &str = "Missing data";

#[derive(Debug, Deserialize)]
pub struct FavoritesQuery {
    pub email: Option<String>,
}

/// An array replaces the set, a single object upserts one favorite
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FavoritesPayload {
    Many(Vec<Favorite>),
    One(Favorite),
}

#[derive(Debug, Deserialize)]
pub struct SaveFavoritesRequest {
    pub email: Option<String>,
    pub favorites: Option<FavoritesPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFavoriteRequest {
    pub email: Option<String>,
    pub favorite_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFavoriteRequest {
    pub email: Option<String>,
    pub favorite_id: Option<String>,
    pub updates: Option<Map<String, Value>>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FavoritesQuery>,
) -> Result<Json<Value>, AppError> {
    let email = non_empty(&query.email).ok_or_else(|| AppError::validation("Email required"))?;

    let favorites = state.favorites.list(email).await?;
    tracing::debug!("Fetched {} favorites for {}", favorites.len(), email);

    Ok(Json(json!({ "favorites": favorites })))
}

pub async fn save_favorites(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SaveFavoritesRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    let (Some(email), Some(favorites)) = (non_empty(&req.email), req.favorites.as_ref()) else {
        return Err(AppError::validation(MISSING_DATA));
    };

    let count = match favorites {
        FavoritesPayload::Many(list) => {
            let mut seen = HashSet::new();
            for favorite in list {
                if favorite.favorite_id.is_empty() {
                    return Err(AppError::validation(MISSING_DATA));
                }
                if !seen.insert(favorite.favorite_id.as_str()) {
                    return Err(AppError::validation("Duplicate favoriteId"));
                }
            }
            state.favorites.replace_all(email, list).await?
        }
        FavoritesPayload::One(favorite) => {
            if favorite.favorite_id.is_empty() {
                return Err(AppError::validation(MISSING_DATA));
            }
            state.favorites.upsert(email, favorite).await?;
            1
        }
    };

    tracing::info!("Saved {} favorites for {}", count, email);

    Ok(Json(json!({
        "message": "Favorites saved successfully",
        "count": count,
    })))
}

pub async fn delete_favorite(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteFavoriteRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    let (Some(email), Some(favorite_id)) = (non_empty(&req.email), non_empty(&req.favorite_id)) else {
        return Err(AppError::validation(MISSING_DATA));
    };

    if !state.favorites.delete(email, favorite_id).await? {
        return Err(AppError::not_found("Favorite not found"));
    }

    tracing::info!("Removed favorite {} for {}", favorite_id, email);
    Ok(Json(json!({ "message": "Favorite removed" })))
}

pub async fn update_favorite(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateFavoriteRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    let (Some(email), Some(favorite_id), Some(updates)) =
        (non_empty(&req.email), non_empty(&req.favorite_id), req.updates.clone())
    else {
        return Err(AppError::validation(MISSING_DATA));
    };

    if !state.favorites.update(email, favorite_id, updates).await? {
        return Err(AppError::not_found("Favorite not found"));
    }

    tracing::info!("Updated favorite {} for {}", favorite_id, email);
    Ok(Json(json!({ "message": "Favorite updated" })))
}
