use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::config::AppConfig;
use crate::favorites::FavoriteStore;
use crate::search::RecordStore;

/// Account status change / 账户状态变化事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthEvent {
    #[serde(rename_all = "camelCase")]
    SignedIn { email: String, at: String },
    #[serde(rename_all = "camelCase")]
    SignedOut { email: String, at: String },
}

impl AuthEvent {
    pub fn email(&self) -> &str {
        match self {
            AuthEvent::SignedIn { email, .. } | AuthEvent::SignedOut { email, .. } => email,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn { .. } => "signedIn",
            AuthEvent::SignedOut { .. } => "signedOut",
        }
    }
}

/// Broadcast channel for account events / 账户事件广播通道
///
/// Every open client (tab, device) subscribes for its own account and reacts to
/// sign-in/sign-out performed elsewhere.
pub struct AuthEvents {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AuthEvent) {
        // 没有订阅者时发送失败，忽略
        if self.sender.send(event).is_err() {
            tracing::trace!("No account event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Events for one account only / 仅订阅指定账户
    pub fn subscribe_account(&self, email: String) -> impl Stream<Item = AuthEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(move |msg| match msg {
            Ok(event) if event.email() == email => Some(event),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Account event subscriber for {} lagged: {}", email, e);
                None
            }
        })
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

pub struct AppState {
    pub db: SqlitePool,
    pub records: RecordStore,
    pub favorites: FavoriteStore,
    pub config: AppConfig,
    pub events: AuthEvents,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig) -> Self {
        Self {
            records: RecordStore::new(db.clone()),
            favorites: FavoriteStore::new(db.clone()),
            db,
            config,
            events: AuthEvents::default(),
        }
    }
}
