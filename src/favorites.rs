//! Favorites store / 收藏存储
//!
//! Favorites are keyed by (email, favoriteId). Apart from `favoriteId` and `note`
//! the client decides what a favorite carries (usually the favorited record's
//! columns); those fields are kept as a JSON object in the `data` column.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::FavoriteRow;

/// Keys owned by the server, never taken from client payloads / 服务端字段
const RESERVED_KEYS: [&str; 3] = ["favoriteId", "email", "updatedAt"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub favorite_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Favorite as returned to clients / 返回给客户端的收藏
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFavorite {
    pub email: String,
    #[serde(flatten)]
    pub favorite: Favorite,
    pub updated_at: String,
}

impl TryFrom<FavoriteRow> for StoredFavorite {
    type Error = AppError;

    fn try_from(row: FavoriteRow) -> Result<Self, Self::Error> {
        let fields: Map<String, Value> = serde_json::from_str(&row.data)?;
        Ok(StoredFavorite {
            email: row.email,
            favorite: Favorite {
                favorite_id: row.favorite_id,
                note: row.note,
                fields,
            },
            updated_at: row.updated_at,
        })
    }
}

fn client_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()) && k.as_str() != "note")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn note_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[derive(Clone)]
pub struct FavoriteStore {
    db: SqlitePool,
}

impl FavoriteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn list(&self, email: &str) -> Result<Vec<StoredFavorite>, AppError> {
        let rows: Vec<FavoriteRow> = sqlx::query_as(
            "SELECT email, favorite_id, note, data, updated_at FROM favorites WHERE email = ? ORDER BY seq",
        )
        .bind(email)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StoredFavorite::try_from).collect()
    }

    /// Replace the whole set in one transaction / 在一个事务中整体替换
    pub async fn replace_all(&self, email: &str, favorites: &[Favorite]) -> Result<usize, AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM favorites WHERE email = ?")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        for favorite in favorites {
            sqlx::query(
                "INSERT INTO favorites (email, favorite_id, note, data, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(email)
            .bind(&favorite.favorite_id)
            .bind(&favorite.note)
            .bind(serde_json::to_string(&client_fields(&favorite.fields))?)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(favorites.len())
    }

    /// Insert or overwrite one favorite / 插入或覆盖单个收藏
    pub async fn upsert(&self, email: &str, favorite: &Favorite) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO favorites (email, favorite_id, note, data, updated_at) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(email, favorite_id) DO UPDATE SET
                note = excluded.note,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(email)
        .bind(&favorite.favorite_id)
        .bind(&favorite.note)
        .bind(serde_json::to_string(&client_fields(&favorite.fields))?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Returns false when nothing matched / 未找到时返回 false
    pub async fn delete(&self, email: &str, favorite_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM favorites WHERE email = ? AND favorite_id = ?")
            .bind(email)
            .bind(favorite_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Merge a partial update into one favorite / 部分更新
    pub async fn update(
        &self,
        email: &str,
        favorite_id: &str,
        updates: Map<String, Value>,
    ) -> Result<bool, AppError> {
        let mut tx = self.db.begin().await?;

        let row: Option<FavoriteRow> = sqlx::query_as(
            "SELECT email, favorite_id, note, data, updated_at FROM favorites WHERE email = ? AND favorite_id = ?",
        )
        .bind(email)
        .bind(favorite_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };

        let mut note = row.note;
        let mut data: Map<String, Value> = serde_json::from_str(&row.data)?;
        for (key, value) in updates {
            match key.as_str() {
                "note" => note = note_value(value),
                k if RESERVED_KEYS.contains(&k) => {}
                _ => {
                    data.insert(key, value);
                }
            }
        }

        sqlx::query("UPDATE favorites SET note = ?, data = ?, updated_at = ? WHERE email = ? AND favorite_id = ?")
            .bind(&note)
            .bind(serde_json::to_string(&data)?)
            .bind(Utc::now().to_rfc3339())
            .bind(email)
            .bind(favorite_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    async fn store() -> FavoriteStore {
        let pool = db::connect_memory().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        FavoriteStore::new(pool)
    }

    fn favorite(id: &str) -> Favorite {
        serde_json::from_value(json!({
            "favoriteId": id,
            "Place_of_Service": "Office",
            "Allowed_Charges_Per_Person": 120.5
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_replace_and_list_in_order() {
        let store = store().await;
        let count = store
            .replace_all("a@example.com", &[favorite("f2"), favorite("f1")])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let listed = store.list("a@example.com").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|f| f.favorite.favorite_id.as_str()).collect();
        assert_eq!(ids, vec!["f2", "f1"]);
        assert_eq!(listed[0].favorite.fields["Place_of_Service"], "Office");
        assert!(store.list("b@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_with_empty_clears() {
        let store = store().await;
        store.replace_all("a@example.com", &[favorite("f1")]).await.unwrap();
        assert_eq!(store.replace_all("a@example.com", &[]).await.unwrap(), 0);
        assert!(store.list("a@example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_set() {
        let store = store().await;
        store.replace_all("a@example.com", &[favorite("keep")]).await.unwrap();

        // duplicate keys violate the unique constraint mid-transaction
        let result = store
            .replace_all("a@example.com", &[favorite("x"), favorite("x")])
            .await;
        assert!(result.is_err());

        let listed = store.list("a@example.com").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].favorite.favorite_id, "keep");
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = store().await;
        store.replace_all("a@example.com", &[favorite("f1")]).await.unwrap();
        assert!(store.delete("a@example.com", "f1").await.unwrap());
        assert!(!store.delete("a@example.com", "f1").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_merges_note_and_ignores_keys() {
        let store = store().await;
        store.replace_all("a@example.com", &[favorite("f1")]).await.unwrap();

        let updates = json!({"note": "call first", "favoriteId": "hijack", "email": "x@example.com"});
        let updated = store
            .update("a@example.com", "f1", updates.as_object().unwrap().clone())
            .await
            .unwrap();
        assert!(updated);

        let listed = store.list("a@example.com").await.unwrap();
        assert_eq!(listed[0].favorite.favorite_id, "f1");
        assert_eq!(listed[0].favorite.note.as_deref(), Some("call first"));
        assert_eq!(listed[0].favorite.fields["Allowed_Charges_Per_Person"], 120.5);
        assert!(listed[0].favorite.fields.get("email").is_none());

        let missing = store
            .update("a@example.com", "nope", Map::new())
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = store().await;
        store.upsert("a@example.com", &favorite("f1")).await.unwrap();
        let mut changed = favorite("f1");
        changed.note = Some("second".to_string());
        store.upsert("a@example.com", &changed).await.unwrap();

        let listed = store.list("a@example.com").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].favorite.note.as_deref(), Some("second"));
    }

    #[test]
    fn test_stored_favorite_json_shape() {
        let stored = StoredFavorite {
            email: "a@example.com".to_string(),
            favorite: favorite("f1"),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["email"], "a@example.com");
        assert_eq!(value["favoriteId"], "f1");
        assert_eq!(value["Place_of_Service"], "Office");
        assert_eq!(value["updatedAt"], "2024-01-01T00:00:00Z");
        assert!(value.get("note").is_none());
    }
}
