use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;

use super::types::*;
use crate::auth::Session;
use crate::error::AppError;
use crate::models::{Profile, User};
use crate::state::AppState;

/// Session probe by email / 按邮箱查询登录状态
pub async fn session_probe(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<Profile>, AppError> {
    let Json(req) = payload?;
    let email = present(&req.email).ok_or_else(|| AppError::validation("Email is required"))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    Ok(Json(user.profile()))
}

/// Account behind the session cookie / 当前会话对应的账户
pub async fn current_session(session: Session) -> Json<Profile> {
    Json(session.profile())
}

/// Server-sent events for the signed-in account / 当前账户的事件推送
pub async fn account_events(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let email = session.user.email;
    tracing::debug!("Account event subscriber: {}", email);

    let stream = state.events.subscribe_account(email).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().event(event.name()).data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
