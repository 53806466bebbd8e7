//! Job storage boundary and the in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use textgate_core::{DomainError, Job, JobId, JobOutcome, JobSummary, JobText};

/// Upper bound on `list_recent`, whatever the caller asks for.
pub const MAX_LIST_LIMIT: usize = 50;

/// Job store abstraction.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in the `PENDING` state.
    ///
    /// Never overwrites: an existing id yields `AlreadyExists`.
    async fn create(&self, id: JobId, text: JobText) -> Result<Job, JobStoreError>;

    /// Get a job by ID, with any results the analyzer wrote.
    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Most recently created jobs first, at most `MAX_LIST_LIMIT`.
    async fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>, JobStoreError>;

    /// Delete a job and its keyword rows. Returns whether the job existed.
    async fn delete(&self, id: JobId) -> Result<bool, JobStoreError>;

    /// Delete every job and keyword row. Returns how many jobs were removed.
    async fn delete_all(&self) -> Result<u64, JobStoreError>;

    /// Apply a status/result update written by the analyzer.
    async fn record_outcome(&self, id: JobId, outcome: JobOutcome) -> Result<Job, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("invalid status transition for job {id}: {from} -> {to}")]
    InvalidTransition { id: JobId, from: String, to: String },
    #[error("storage error: {0}")]
    Storage(String),
}

impl JobStoreError {
    pub(crate) fn from_domain(id: JobId, err: DomainError) -> Self {
        match err {
            DomainError::InvalidTransition { from, to } => Self::InvalidTransition { id, from, to },
            DomainError::NotFound => Self::NotFound(id),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[derive(Debug)]
struct StoredJob {
    job: Job,
    // Insertion order. Unlike `created_at` it cannot tie or go backwards.
    seq: u64,
}

#[derive(Debug, Default)]
struct Tables {
    jobs: HashMap<JobId, StoredJob>,
    keywords: HashMap<JobId, Vec<String>>,
    next_seq: u64,
}

impl Tables {
    fn assemble(&self, stored: &StoredJob) -> Job {
        let mut job = stored.job.clone();
        if let Some(results) = job.results.as_mut() {
            results.keywords = self.keywords.get(&job.id).cloned().unwrap_or_default();
        }
        job
    }
}

/// In-memory job store for tests/dev.
///
/// Jobs and keyword rows sit behind one lock, so every operation is atomic
/// with respect to every other.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    tables: RwLock<Tables>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of keyword rows held for `id`.
    pub fn keyword_rows(&self, id: JobId) -> Result<usize, JobStoreError> {
        Ok(self.read()?.keywords.get(&id).map_or(0, Vec::len))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, JobStoreError> {
        self.tables
            .read()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, JobStoreError> {
        self.tables
            .write()
            .map_err(|_| JobStoreError::Storage("lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, id: JobId, text: JobText) -> Result<Job, JobStoreError> {
        let mut tables = self.write()?;
        if tables.jobs.contains_key(&id) {
            return Err(JobStoreError::AlreadyExists(id));
        }

        let job = Job::new(id, text, Utc::now());
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.jobs.insert(id, StoredJob { job: job.clone(), seq });
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let tables = self.read()?;
        Ok(tables.jobs.get(&id).map(|stored| tables.assemble(stored)))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<JobSummary>, JobStoreError> {
        let tables = self.read()?;
        let mut rows: Vec<&StoredJob> = tables.jobs.values().collect();
        rows.sort_by(|a, b| b.seq.cmp(&a.seq));

        Ok(rows
            .into_iter()
            .take(limit.min(MAX_LIST_LIMIT))
            .map(|stored| stored.job.summary())
            .collect())
    }

    async fn delete(&self, id: JobId) -> Result<bool, JobStoreError> {
        let mut tables = self.write()?;
        tables.keywords.remove(&id);
        Ok(tables.jobs.remove(&id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, JobStoreError> {
        let mut tables = self.write()?;
        let count = tables.jobs.len() as u64;
        tables.keywords.clear();
        tables.jobs.clear();
        Ok(count)
    }

    async fn record_outcome(&self, id: JobId, outcome: JobOutcome) -> Result<Job, JobStoreError> {
        let mut tables = self.write()?;
        let stored = tables.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;

        let keywords = outcome.results.keywords.clone();
        stored
            .job
            .apply_outcome(outcome, Utc::now())
            .map_err(|e| JobStoreError::from_domain(id, e))?;
        // Keywords live in their own table; the job row keeps the scalar columns.
        if let Some(results) = stored.job.results.as_mut() {
            results.keywords.clear();
        }

        if keywords.is_empty() {
            tables.keywords.remove(&id);
        } else {
            tables.keywords.insert(id, keywords);
        }

        let stored = tables.jobs.get(&id).ok_or(JobStoreError::NotFound(id))?;
        Ok(tables.assemble(stored))
    }
}
