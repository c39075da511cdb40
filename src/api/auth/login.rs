use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use super::types::*;
use crate::auth::{create_session, delete_user_sessions, removal_cookie, session_cookie};
use crate::error::AppError;
use crate::models::{AccountStatus, User};
use crate::state::{AppState, AuthEvent};

/// Same message for unknown email and wrong password / 不区分账号不存在与密码错误
const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;

    let (Some(email), Some(password)) = (present(&req.email), present(&req.password)) else {
        return Err(AppError::validation("Email and password are required"));
    };

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&state.db)
        .await?;

    let Some(mut user) = user else {
        tracing::debug!("Login for unknown account: {}", email);
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };

    if !bcrypt::verify(password, &user.password_hash)? {
        tracing::debug!("Wrong password for {}", email);
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE users SET status = ?, last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(AccountStatus::SignedIn.as_str())
        .bind(&now)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;
    user.status = AccountStatus::SignedIn.as_str().to_string();
    user.last_login_at = Some(now.clone());
    user.updated_at = now.clone();

    let session_id = create_session(&state.db, &user.id, state.config.auth.session_ttl_hours).await?;
    cookies.add(session_cookie(session_id));

    state.events.publish(AuthEvent::SignedIn {
        email: user.email.clone(),
        at: now,
    });
    tracing::info!("Signed in: {}", user.email);

    Ok(Json(json!({
        "message": "Login successful!",
        "success": true,
        "user": user.profile(),
    })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    let email = present(&req.email).ok_or_else(|| AppError::validation("Email is required"))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE users SET status = ?, last_logout_at = ?, updated_at = ? WHERE id = ?")
        .bind(AccountStatus::SignedOut.as_str())
        .bind(&now)
        .bind(&now)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    delete_user_sessions(&state.db, &user.id).await?;
    cookies.remove(removal_cookie());

    state.events.publish(AuthEvent::SignedOut {
        email: user.email.clone(),
        at: now,
    });
    tracing::info!("Signed out: {}", user.email);

    Ok(Json(json!({
        "message": "Logged out successfully",
        "status": AccountStatus::SignedOut.as_str(),
    })))
}
