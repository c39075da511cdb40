use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

use crate::models::ServiceRecord;
use crate::search::store::insert_record;
use crate::search::RecordStore;

/// Open the main database pool (WAL mode) / 打开主数据库连接池
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await
        .with_context(|| format!("failed to open database {}", database_url))?;

    // 启用WAL模式，提高并发性能
    sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
    // 设置busy_timeout，避免锁超时
    sqlx::query("PRAGMA busy_timeout=5000").execute(&pool).await?;

    tracing::info!("Database opened: {}", database_url);
    Ok(pool)
}

/// Single-connection in-memory database / 单连接内存数据库
pub async fn connect_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// Run database migrations / 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS service_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            place_of_service TEXT NOT NULL,
            type_of_service TEXT NOT NULL,
            allowed_charges_per_person REAL NOT NULL,
            place_of_service_lower TEXT NOT NULL DEFAULT '',
            type_of_service_lower TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 迁移：旧表缺少小写列时补齐并回填
    let has_folded: bool = sqlx::query_scalar::<_, i32>(
        "SELECT COUNT(*) FROM pragma_table_info('service_records') WHERE name = 'place_of_service_lower'",
    )
    .fetch_one(pool)
    .await
    .map(|count| count > 0)
    .unwrap_or(false);

    if !has_folded {
        tracing::info!("Migration: Adding lower-cased search columns to service_records");
        sqlx::query("ALTER TABLE service_records ADD COLUMN place_of_service_lower TEXT NOT NULL DEFAULT ''")
            .execute(pool)
            .await?;
        sqlx::query("ALTER TABLE service_records ADD COLUMN type_of_service_lower TEXT NOT NULL DEFAULT ''")
            .execute(pool)
            .await?;
        backfill_folded_columns(pool).await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_charge ON service_records(allowed_charges_per_person)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'loggedout',
            last_login_at TEXT,
            last_logout_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS favorites (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            favorite_id TEXT NOT NULL,
            note TEXT,
            data TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT NOT NULL,
            UNIQUE (email, favorite_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database migrations complete");
    Ok(())
}

async fn backfill_folded_columns(pool: &SqlitePool) -> Result<()> {
    let rows: Vec<(i64, String, String)> =
        sqlx::query_as("SELECT id, place_of_service, type_of_service FROM service_records")
            .fetch_all(pool)
            .await?;

    let mut tx = pool.begin().await?;
    for (id, place, kind) in &rows {
        sqlx::query("UPDATE service_records SET place_of_service_lower = ?, type_of_service_lower = ? WHERE id = ?")
            .bind(place.to_lowercase())
            .bind(kind.to_lowercase())
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!("Backfilled search columns for {} records", rows.len());
    Ok(())
}

/// Import a JSON array of service records if the table is empty / 导入种子数据
pub async fn import_records(pool: &SqlitePool, path: &Path) -> Result<usize> {
    let store = RecordStore::new(pool.clone());
    if store.count().await? > 0 {
        tracing::info!("Service records already present, skipping import of {:?}", path);
        return Ok(0);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {:?}", path))?;
    let records: Vec<ServiceRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse seed file {:?}", path))?;

    let mut tx = pool.begin().await?;
    for record in &records {
        insert_record(&mut *tx, record).await?;
    }
    tx.commit().await?;

    tracing::info!("Imported {} service records from {:?}", records.len(), path);
    Ok(records.len())
}
