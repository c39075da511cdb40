use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

use super::filter::FilterExpression;
use crate::models::ServiceRecord;

/// Service record store backed by SQLite / 基于 SQLite 的记录存储
#[derive(Clone)]
pub struct RecordStore {
    db: SqlitePool,
}

impl RecordStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Evaluate a filter, natural order, capped at the filter limit / 按自然顺序返回
    pub async fn find(&self, filter: &FilterExpression) -> Result<Vec<ServiceRecord>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, place_of_service, type_of_service, allowed_charges_per_person FROM service_records",
        );
        filter.push_where(&mut qb);
        qb.push(" ORDER BY id LIMIT ").push_bind(filter.limit() as i64);

        qb.build_query_as::<ServiceRecord>().fetch_all(&self.db).await
    }

    pub async fn insert(&self, record: &ServiceRecord) -> Result<i64, sqlx::Error> {
        insert_record(&self.db, record).await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM service_records")
            .fetch_one(&self.db)
            .await
    }
}

/// Insert one record with its lower-cased search columns / 插入记录及小写列
pub async fn insert_record<'e, E>(executor: E, record: &ServiceRecord) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO service_records
            (place_of_service, type_of_service, allowed_charges_per_person, place_of_service_lower, type_of_service_lower)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.place_of_service)
    .bind(&record.type_of_service)
    .bind(record.allowed_charges_per_person)
    .bind(record.place_of_service.to_lowercase())
    .bind(record.type_of_service.to_lowercase())
    .execute(executor)
    .await?;
    Ok(result.last_insert_rowid())
}
