//! PostgreSQL-backed history store
//!
//! History rows live in `resource_history`, keyed by `(resource_type, resource_id,
//! version_id)`. The primary key plus the guarded insert keep versions contiguous even
//! when several processes write the same resource.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::store::HistoryStore;
use crate::{
    models::{ResourceKey, VersionAction, VersionHead, VersionRecord},
    Error, Result,
};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS resource_history (
    resource_type TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    version_id INTEGER NOT NULL,
    action TEXT NOT NULL,
    snapshot JSONB NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (resource_type, resource_id, version_id)
)
"#;

#[derive(Debug, Clone)]
pub struct PostgresHistoryStore {
    pool: PgPool,
}

impl PostgresHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the history table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn head_version(&self, key: &ResourceKey) -> Result<i32> {
        Ok(self.head(key).await?.map(|h| h.version_id).unwrap_or(0))
    }
}

fn action_from_row(row: &PgRow) -> Result<VersionAction> {
    let action: String = row.get("action");
    VersionAction::parse(&action)
        .ok_or_else(|| Error::Internal(format!("Unknown history action '{}'", action)))
}

fn record_from_row(row: &PgRow) -> Result<VersionRecord> {
    Ok(VersionRecord {
        resource_type: row.get("resource_type"),
        resource_id: row.get("resource_id"),
        version_id: row.get("version_id"),
        action: action_from_row(row)?,
        snapshot: row.get("snapshot"),
        timestamp: row.get("recorded_at"),
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    async fn head(&self, key: &ResourceKey) -> Result<Option<VersionHead>> {
        let row = sqlx::query(
            r#"
            SELECT version_id, action
            FROM resource_history
            WHERE resource_type = $1 AND resource_id = $2
            ORDER BY version_id DESC
            LIMIT 1
            "#,
        )
        .bind(&key.resource_type)
        .bind(&key.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(|row| -> Result<VersionHead> {
            Ok(VersionHead {
                version_id: row.get("version_id"),
                action: action_from_row(&row)?,
            })
        })
        .transpose()
    }

    async fn append(&self, record: VersionRecord) -> Result<()> {
        let key = record.key();

        // Only insert when the new version directly follows the stored head.
        let result = sqlx::query(
            r#"
            INSERT INTO resource_history
                (resource_type, resource_id, version_id, action, snapshot, recorded_at)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE (
                SELECT COALESCE(MAX(version_id), 0)
                FROM resource_history
                WHERE resource_type = $1 AND resource_id = $2
            ) = $3 - 1
            "#,
        )
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(record.version_id)
        .bind(record.action.as_str())
        .bind(&record.snapshot)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(()),
            Ok(_) => Err(Error::VersionConflict {
                expected: record.version_id - 1,
                actual: self.head_version(&key).await?,
            }),
            Err(e) if is_unique_violation(&e) => Err(Error::VersionConflict {
                expected: record.version_id - 1,
                actual: self.head_version(&key).await?,
            }),
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn list(
        &self,
        key: &ResourceKey,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VersionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT resource_type, resource_id, version_id, action, snapshot, recorded_at
            FROM resource_history
            WHERE resource_type = $1 AND resource_id = $2
            ORDER BY version_id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&key.resource_type)
        .bind(&key.id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, key: &ResourceKey, version_id: i32) -> Result<Option<VersionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT resource_type, resource_id, version_id, action, snapshot, recorded_at
            FROM resource_history
            WHERE resource_type = $1 AND resource_id = $2 AND version_id = $3
            "#,
        )
        .bind(&key.resource_type)
        .bind(&key.id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn count(&self, key: &ResourceKey) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM resource_history WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(&key.resource_type)
        .bind(&key.id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}
