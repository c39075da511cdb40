pub mod auth;
pub mod favorites;
pub mod search;


use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// 健康检查
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

/// Build the HTTP router / 构建路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/data", get(search::search))
        // Accounts
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/mylog", post(auth::session_probe))
        .route("/api/auth/me", get(auth::current_session))
        .route("/api/auth/events", get(auth::account_events))
        // Favorites
        .route(
            "/api/favorites",
            get(favorites::list_favorites)
                .post(favorites::save_favorites)
                .put(favorites::update_favorite)
                .delete(favorites::delete_favorite),
        )
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
