//! Postgres-backed job store.
//!
//! ## Schema
//!
//! - `jobs(id, text, status, sentiment, confidence, created_at, updated_at)`
//! - `job_keywords(job_id, keyword)`, written by the analyzer and deleted in
//!   lockstep with the owning job
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | JobStoreError | Scenario |
//! |------------|----------------------|---------------|----------|
//! | Database (unique violation) | `23505` | `AlreadyExists` | Id collision on insert |
//! | Database (other) | Any other | `Storage` | Constraint or schema problems |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Atomicity
//!
//! `delete`, `delete_all` and `record_outcome` each run in one transaction and
//! lock the affected job rows first, so keyword rows can never outlive their
//! job or be attached to a job that is being deleted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, instrument, Span};

use textgate_core::{Job, JobId, JobOutcome, JobResults, JobStatus, JobSummary, JobText};

use super::store::{JobStore, JobStoreError, MAX_LIST_LIMIT};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id UUID PRIMARY KEY,
        text TEXT NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
        sentiment VARCHAR(20),
        confidence DOUBLE PRECISION,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // Tables created by older deployments lack the result columns.
    "ALTER TABLE jobs ADD COLUMN IF NOT EXISTS sentiment VARCHAR(20)",
    "ALTER TABLE jobs ADD COLUMN IF NOT EXISTS confidence DOUBLE PRECISION",
    // Older deployments also allowed NULL timestamps.
    "UPDATE jobs SET created_at = COALESCE(updated_at, NOW()) WHERE created_at IS NULL",
    "UPDATE jobs SET updated_at = created_at WHERE updated_at IS NULL",
    "ALTER TABLE jobs ALTER COLUMN created_at SET DEFAULT NOW()",
    "ALTER TABLE jobs ALTER COLUMN updated_at SET DEFAULT NOW()",
    "ALTER TABLE jobs ALTER COLUMN created_at SET NOT NULL",
    "ALTER TABLE jobs ALTER COLUMN updated_at SET NOT NULL",
    r#"
    CREATE TABLE IF NOT EXISTS job_keywords (
        job_id UUID NOT NULL REFERENCES jobs (id),
        keyword VARCHAR(255)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_job_keywords_job_id ON job_keywords (job_id)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs (created_at DESC)",
];

/// Postgres-backed job store.
///
/// ## Thread Safety
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    /// Create a new PostgresJobStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, JobStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), JobStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        info!("job tables ready");
        Ok(())
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, JobStoreError> {
        self.pool.begin().await.map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self, text), fields(job_id = %id), err)]
    async fn create(&self, id: JobId, text: JobText) -> Result<Job, JobStoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO jobs (id, text, status)
            VALUES ($1, $2, $3)
            RETURNING
                created_at::timestamptz AS created_at,
                updated_at::timestamptz AS updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(text.as_str())
        .bind(JobStatus::Pending.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                JobStoreError::AlreadyExists(id)
            } else {
                map_sqlx_error("create_job", e)
            }
        })?;

        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("create_job", e))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| map_sqlx_error("create_job", e))?;

        let mut job = Job::new(id, text, created_at);
        job.updated_at = updated_at;
        Ok(job)
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let mut tx = self.begin("get_job").await?;

        // Job row and keyword rows must come from the same snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;

        let row = sqlx::query(
            r#"
            SELECT
                id,
                text,
                status,
                sentiment,
                confidence,
                created_at::timestamptz AS created_at,
                updated_at::timestamptz AS updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("get_job", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let row = JobRow::from_row(&row).map_err(|e| map_sqlx_error("get_job", e))?;

        let keywords = if JobStatus::parse(&row.status) == JobStatus::Completed {
            load_keywords(&mut tx, id).await?
        } else {
            Vec::new()
        };

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;

        row.into_job(keywords).map(Some)
    }

    #[instrument(skip(self), fields(job_count = tracing::field::Empty), err)]
    async fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>, JobStoreError> {
        let limit = limit.min(MAX_LIST_LIMIT) as i64;

        let rows = sqlx::query(
            r#"
            SELECT
                id,
                status,
                created_at::timestamptz AS created_at,
                updated_at::timestamptz AS updated_at
            FROM jobs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_jobs", e))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: uuid::Uuid = row.try_get("id").map_err(|e| map_sqlx_error("list_jobs", e))?;
            let status: String = row.try_get("status").map_err(|e| map_sqlx_error("list_jobs", e))?;
            summaries.push(JobSummary {
                id: JobId::from_uuid(id),
                status: JobStatus::parse(&status),
                created_at: row.try_get("created_at").map_err(|e| map_sqlx_error("list_jobs", e))?,
                updated_at: row.try_get("updated_at").map_err(|e| map_sqlx_error("list_jobs", e))?,
            });
        }

        Span::current().record("job_count", summaries.len());
        Ok(summaries)
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn delete(&self, id: JobId) -> Result<bool, JobStoreError> {
        let mut tx = self.begin("delete_job").await?;

        // Lock the row so the analyzer cannot attach keywords mid-delete.
        let exists = sqlx::query("SELECT id FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_job", e))?
            .is_some();

        sqlx::query("DELETE FROM job_keywords WHERE job_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_job", e))?;

        if exists {
            sqlx::query("DELETE FROM jobs WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_job", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_job", e))?;

        Ok(exists)
    }

    #[instrument(skip(self), err)]
    async fn delete_all(&self) -> Result<u64, JobStoreError> {
        let mut tx = self.begin("delete_all_jobs").await?;

        // Plain reads keep working; inserts and analyzer updates wait for us.
        sqlx::query("LOCK TABLE jobs IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_all_jobs", e))?;

        sqlx::query("DELETE FROM job_keywords")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_all_jobs", e))?;

        let deleted = sqlx::query("DELETE FROM jobs")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_all_jobs", e))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_all_jobs", e))?;

        Ok(deleted)
    }

    #[instrument(skip(self, outcome), fields(job_id = %id, status = %outcome.status), err)]
    async fn record_outcome(&self, id: JobId, outcome: JobOutcome) -> Result<Job, JobStoreError> {
        let mut tx = self.begin("record_outcome").await?;

        let current: Option<String> = sqlx::query("SELECT status FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_outcome", e))?
            .map(|row| row.try_get::<String, _>("status"))
            .transpose()
            .map_err(|e| map_sqlx_error("record_outcome", e))?;

        let current = JobStatus::parse(&current.ok_or(JobStoreError::NotFound(id))?);
        let next = outcome.status.canonical();
        if !current.can_transition_to(&next) {
            return Err(JobStoreError::InvalidTransition {
                id,
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, sentiment = $3, confidence = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(next.as_str())
        .bind(outcome.results.sentiment.as_deref())
        .bind(outcome.results.confidence)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record_outcome", e))?;

        sqlx::query("DELETE FROM job_keywords WHERE job_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("record_outcome", e))?;

        if !outcome.results.keywords.is_empty() {
            sqlx::query("INSERT INTO job_keywords (job_id, keyword) SELECT $1, UNNEST($2::text[])")
                .bind(id.as_uuid())
                .bind(outcome.results.keywords.as_slice())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("record_outcome", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("record_outcome", e))?;

        self.get(id).await?.ok_or(JobStoreError::NotFound(id))
    }
}

async fn load_keywords(
    tx: &mut Transaction<'_, Postgres>,
    id: JobId,
) -> Result<Vec<String>, JobStoreError> {
    let rows = sqlx::query("SELECT keyword FROM job_keywords WHERE job_id = $1 AND keyword IS NOT NULL")
        .bind(id.as_uuid())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_keywords", e))?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("keyword"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| map_sqlx_error("load_keywords", e))
}

/// Database row for a job (internal).
struct JobRow {
    id: uuid::Uuid,
    text: String,
    status: String,
    sentiment: Option<String>,
    confidence: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            text: row.try_get("text")?,
            status: row.try_get("status")?,
            sentiment: row.try_get("sentiment")?,
            confidence: row.try_get("confidence")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_job(self, keywords: Vec<String>) -> Result<Job, JobStoreError> {
        let id = JobId::from_uuid(self.id);
        let text = JobText::parse(&self.text)
            .map_err(|e| JobStoreError::Storage(format!("corrupt text for job {id}: {e}")))?;
        let status = JobStatus::parse(&self.status);

        let wrote_something = self.sentiment.is_some() || self.confidence.is_some();
        let results = (status == JobStatus::Completed || wrote_something).then(|| JobResults {
            sentiment: self.sentiment,
            confidence: self.confidence,
            keywords,
        });

        Ok(Job {
            id,
            text,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            results,
        })
    }
}

/// Map SQLx errors to JobStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => JobStoreError::Storage(format!(
            "database error in {}: {} (code {})",
            operation,
            db_err.message(),
            db_err.code().as_deref().unwrap_or("none")
        )),
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => JobStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
