use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::types::*;
use crate::auth::MIN_PASSWORD_LEN;
use crate::error::AppError;
use crate::models::{AccountStatus, User};
use crate::state::AppState;

const DUPLICATE_EMAIL: &str = "User with this email already exists";

pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(req) = payload?;

    let (Some(first_name), Some(last_name), Some(email), Some(password)) = (
        present(&req.first_name),
        present(&req.last_name),
        present(&req.email),
        present(&req.password),
    ) else {
        return Err(AppError::validation("All fields are required"));
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password must be at least 8 characters"));
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict(DUPLICATE_EMAIL));
    }

    let password_hash = bcrypt::hash(password, state.config.auth.bcrypt_cost)?;
    let now = Utc::now().to_rfc3339();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        password_hash,
        status: AccountStatus::SignedOut.as_str().to_string(),
        last_login_at: None,
        last_logout_at: None,
        created_at: now.clone(),
        updated_at: now,
    };

    let inserted = sqlx::query(
        "INSERT INTO users (id, first_name, last_name, email, password_hash, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.status)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(&state.db)
    .await;

    // 并发注册同一邮箱时由唯一约束兜底
    if let Err(e) = inserted {
        let unique = e
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);
        return Err(if unique {
            AppError::conflict(DUPLICATE_EMAIL)
        } else {
            e.into()
        });
    }

    tracing::info!("Account created: {}", user.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": user.profile(),
        })),
    ))
}
