use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

use crate::error::AppError;
use crate::models::{Profile, User};
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Minimum accepted password length / 密码最短长度
pub const MIN_PASSWORD_LEN: usize = 8;

/// Signed-in session resolved for one request / 当前请求的会话
///
/// Handlers take it as an extractor; a missing, unknown or expired cookie is a 401.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl Session {
    pub fn profile(&self) -> Profile {
        self.user.profile()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(anyhow::anyhow!(msg)))?;

        let session_id = cookies
            .get(SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .ok_or_else(|| AppError::unauthorized("Not signed in"))?;

        find_session(&state.db, &session_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("Session expired"))
    }
}

/// Look up a live session and its account / 查询有效会话
pub async fn find_session(pool: &SqlitePool, session_id: &str) -> Result<Option<Session>, AppError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT expires_at FROM sessions WHERE id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    let Some((expires_at,)) = row else {
        return Ok(None);
    };

    let expires_at = match DateTime::parse_from_rfc3339(&expires_at) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!("Session {} has a malformed expiry: {}", session_id, e);
            return Ok(None);
        }
    };
    if expires_at <= Utc::now() {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(pool)
            .await?;
        tracing::debug!("Removed expired session {}", session_id);
        return Ok(None);
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT u.* FROM users u INNER JOIN sessions s ON u.id = s.user_id WHERE s.id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(user.map(|user| Session {
        id: session_id.to_string(),
        expires_at,
        user,
    }))
}

/// Create session row, return its id / 创建会话
pub async fn create_session(pool: &SqlitePool, user_id: &str, ttl_hours: i64) -> Result<String, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    let expires_at = now + Duration::hours(ttl_hours);

    purge_expired_sessions(pool).await?;

    sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(user_id)
        .bind(timestamp(expires_at))
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(id)
}

/// Fixed-width UTC timestamp so stored expiries compare as text / 定长时间戳
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Delete all expired sessions / 清理过期会话
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(timestamp(Utc::now()))
        .execute(pool)
        .await?;

    let purged = result.rows_affected();
    if purged > 0 {
        tracing::debug!("Purged {} expired sessions", purged);
    }
    Ok(purged)
}

/// Remove every session of an account (sign out) / 删除账户的所有会话
pub async fn delete_user_sessions(pool: &SqlitePool, user_id: &str) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected();
    if deleted > 0 {
        tracing::debug!("Cleared {} sessions for user {}", deleted, user_id);
    }
    Ok(deleted)
}

pub fn session_cookie(session_id: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, session_id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}

/// 必须设置相同的 path 才能正确删除 cookie
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    cookie.set_path("/");
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn pool_with_user() -> SqlitePool {
        let pool = db::connect_memory().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, status, created_at, updated_at) VALUES ('u1', 'Ada', 'Lovelace', 'ada@example.com', 'x', 'loggedin', ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let pool = pool_with_user().await;
        let id = create_session(&pool, "u1", 1).await.unwrap();

        let session = find_session(&pool, &id).await.unwrap().unwrap();
        assert_eq!(session.user.email, "ada@example.com");
        assert_eq!(session.profile().user_id, "u1");

        assert_eq!(delete_user_sessions(&pool, "u1").await.unwrap(), 1);
        assert!(find_session(&pool, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_ignored() {
        let pool = pool_with_user().await;
        let id = create_session(&pool, "u1", -1).await.unwrap();
        assert!(find_session(&pool, &id).await.unwrap().is_none());
    }

    async fn session_rows(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_expired_session_row_is_deleted_on_lookup() {
        let pool = pool_with_user().await;
        let id = create_session(&pool, "u1", -1).await.unwrap();
        assert_eq!(session_rows(&pool).await, 1);

        assert!(find_session(&pool, &id).await.unwrap().is_none());
        assert_eq!(session_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_new_session_purges_expired_rows() {
        let pool = pool_with_user().await;
        create_session(&pool, "u1", -1).await.unwrap();
        create_session(&pool, "u1", -2).await.unwrap();
        let live = create_session(&pool, "u1", 1).await.unwrap();

        assert_eq!(session_rows(&pool).await, 1);
        assert!(find_session(&pool, &live).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let pool = pool_with_user().await;
        assert!(find_session(&pool, "missing").await.unwrap().is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
