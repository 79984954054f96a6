//! SQLite-backed job record store.
//!
//! Records live in a single `background_jobs` table. `params` is stored as a
//! JSON array in a TEXT column, timestamps as RFC 3339 text (UTC, fixed
//! precision) so lexical order equals chronological order.
//!
//! ## Error Mapping
//!
//! | SQLx Error | JobStoreError |
//! |------------|---------------|
//! | any query/connection failure | `Storage` |
//! | row present but undecodable (bad status, bad JSON, bad timestamp) | `Corrupt` |

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use jobrunner_core::{JobId, JobPatch, JobQuery, JobRecord, JobStatus, NewJobRecord, Page, Target};

use super::store::{JobStore, JobStoreError};

const COLUMNS: &str = "id, class, method, params, priority, attempts, status, error_message, created_at, updated_at";

/// SQLite-backed job store.
///
/// This struct is cheap to clone and is safe to share across threads.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Connect to `database_url` (e.g. `sqlite://jobrunner.db?mode=rwc`) and
    /// make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, JobStoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| map_sqlx_error("parse_url", e))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database (single connection, kept for the pool's
    /// lifetime). Used by tests and the `memory` dev mode.
    pub async fn in_memory() -> Result<Self, JobStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the `background_jobs` table and its listing index if missing.
    pub async fn migrate(&self) -> Result<(), JobStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS background_jobs (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                class         TEXT    NOT NULL,
                method        TEXT    NOT NULL,
                params        TEXT    NOT NULL DEFAULT '[]',
                priority      INTEGER NOT NULL DEFAULT 1,
                attempts      INTEGER NOT NULL DEFAULT 0,
                status        TEXT    NOT NULL,
                error_message TEXT    NULL,
                created_at    TEXT    NOT NULL,
                updated_at    TEXT    NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_table", e))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS background_jobs_listing
                ON background_jobs (priority DESC, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_index", e))?;

        Ok(())
    }

    /// Shared UPDATE for `update` and `transition`; `expected` narrows the
    /// WHERE clause to a status.
    async fn patch(
        &self,
        id: JobId,
        expected: Option<JobStatus>,
        patch: &JobPatch,
    ) -> Result<Option<JobRecord>, JobStoreError> {
        let (set_error, error_message) = match &patch.error_message {
            Some(message) => (true, message.clone()),
            None => (false, None),
        };

        let sql = format!(
            r#"
            UPDATE background_jobs
            SET status        = COALESCE(?1, status),
                attempts      = COALESCE(?2, attempts),
                error_message = CASE WHEN ?3 THEN ?4 ELSE error_message END,
                updated_at    = ?5
            WHERE id = ?6
              AND (?7 IS NULL OR status = ?7)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.attempts.map(i64::from))
            .bind(set_error)
            .bind(error_message)
            .bind(timestamp(Utc::now()))
            .bind(id.get())
            .bind(expected.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_job", e))?;

        row.map(row_to_record).transpose()
    }
}

#[async_trait::async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, new), fields(class = %new.target.class, method = %new.target.method), err)]
    async fn create(&self, new: NewJobRecord) -> Result<JobRecord, JobStoreError> {
        let now = Utc::now();
        let params = Value::Array(new.params.clone()).to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO background_jobs (
                class,
                method,
                params,
                priority,
                attempts,
                status,
                error_message,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&new.target.class)
        .bind(&new.target.method)
        .bind(params)
        .bind(new.priority)
        .bind(i64::from(new.attempts))
        .bind(new.status.as_str())
        .bind(new.error_message.as_deref())
        .bind(timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_job", e))?;

        let id = JobId::new(result.last_insert_rowid());
        debug!(job_id = %id, "job record created");

        // Re-read so the caller sees exactly what was persisted (timestamp
        // precision included).
        self.get(id).await?.ok_or(JobStoreError::NotFound(id))
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, JobStoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM background_jobs WHERE id = ?1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;

        row.map(row_to_record).transpose()
    }

    async fn update(&self, id: JobId, patch: JobPatch) -> Result<JobRecord, JobStoreError> {
        self.patch(id, None, &patch)
            .await?
            .ok_or(JobStoreError::NotFound(id))
    }

    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        patch: JobPatch,
    ) -> Result<Option<JobRecord>, JobStoreError> {
        self.patch(id, Some(expected), &patch).await
    }

    async fn list(&self, query: &JobQuery) -> Result<Page<JobRecord>, JobStoreError> {
        let status = query.status.map(|s| s.as_str());

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM background_jobs
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR priority = ?2)
            "#,
        )
        .bind(status)
        .bind(query.priority)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_jobs", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_jobs", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM background_jobs
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR priority = ?2)
            ORDER BY priority DESC, created_at DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#
        ))
        .bind(status)
        .bind(query.priority)
        .bind(i64::from(query.per_page))
        .bind(query.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_jobs", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(row_to_record(row)?);
        }

        Ok(Page::new(items, total.max(0) as u64, query))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_record(row: SqliteRow) -> Result<JobRecord, JobStoreError> {
    let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("decode_job", e))?;
    let corrupt = |reason: String| JobStoreError::Corrupt { id, reason };
    let column = |e: sqlx::Error| corrupt(e.to_string());

    let class: String = row.try_get("class").map_err(column)?;
    let method: String = row.try_get("method").map_err(column)?;
    let params: String = row.try_get("params").map_err(column)?;
    let priority: i32 = row.try_get("priority").map_err(column)?;
    let attempts: i64 = row.try_get("attempts").map_err(column)?;
    let status: String = row.try_get("status").map_err(column)?;
    let error_message: Option<String> = row.try_get("error_message").map_err(column)?;
    let created_at: String = row.try_get("created_at").map_err(column)?;
    let updated_at: String = row.try_get("updated_at").map_err(column)?;

    let params = match serde_json::from_str::<Value>(&params) {
        Ok(Value::Array(items)) => items,
        Ok(other) => return Err(corrupt(format!("params is not an array: {other}"))),
        Err(e) => return Err(corrupt(format!("params: {e}"))),
    };
    let status = JobStatus::from_str(&status).map_err(|e| corrupt(e.to_string()))?;
    let attempts = u32::try_from(attempts).map_err(|e| corrupt(format!("attempts: {e}")))?;
    let parse_time = |s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("timestamp {s:?}: {e}")))
    };

    Ok(JobRecord {
        id: JobId::new(id),
        target: Target::new(class, method),
        params,
        priority,
        status,
        attempts,
        error_message,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => JobStoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => JobStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
