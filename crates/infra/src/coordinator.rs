//! Job lifecycle coordinator.
//!
//! Request-facing contract for submissions, status reads, listings and
//! deletions. Stateless between calls: everything shared lives in the
//! `JobStore`.
//!
//! Submission order is fixed: validate, mint an id, persist, then notify the
//! analyzer once. Persistence failures fail the submission; notification
//! failures are logged and dropped because the stored job is already the
//! source of truth.

use std::sync::Arc;

use tracing::{error, info, instrument, warn, Span};

use textgate_core::{Job, JobId, JobStatus, JobSummary, JobText};

use crate::analyzer::{AnalyzeRequest, AnalyzerNotifier};
use crate::jobs::{JobStore, JobStoreError, MAX_LIST_LIMIT};

/// Coordinator error, mapped 1:1 onto client-facing failures.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Malformed or missing client input.
    #[error("{0}")]
    Validation(String),
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub id: JobId,
    pub status: JobStatus,
}

pub struct JobCoordinator {
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn AnalyzerNotifier>,
}

impl JobCoordinator {
    pub fn new(store: Arc<dyn JobStore>, notifier: Arc<dyn AnalyzerNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Accept a text for analysis.
    ///
    /// Returns as soon as the job is stored; the analyzer's answer (or lack
    /// of one) never changes the outcome.
    #[instrument(skip_all, fields(job_id = tracing::field::Empty))]
    pub async fn submit(&self, raw_text: &str) -> Result<SubmittedJob, CoordinatorError> {
        let text = JobText::parse(raw_text).map_err(|_| CoordinatorError::Validation("Text cannot be empty".into()))?;

        let id = JobId::new();
        Span::current().record("job_id", tracing::field::display(id));

        let job = match self.store.create(id, text).await {
            Ok(job) => job,
            Err(JobStoreError::AlreadyExists(dup)) => {
                error!(job_id = %dup, "freshly minted job id already exists");
                return Err(JobStoreError::AlreadyExists(dup).into());
            }
            Err(e) => return Err(e.into()),
        };

        let request = AnalyzeRequest {
            job_id: job.id,
            text: job.text.as_str().to_string(),
        };
        match self.notifier.notify(&request).await {
            Ok(()) => info!(job_id = %job.id, "job submitted and analyzer notified"),
            Err(e) => warn!(
                job_id = %job.id,
                error = %e,
                "job submitted but analyzer notification failed; job stays PENDING"
            ),
        }

        Ok(SubmittedJob {
            id: job.id,
            status: job.status,
        })
    }

    /// Current state of a job, results included once completed.
    #[instrument(skip(self))]
    pub async fn get_status(&self, raw_id: &str) -> Result<Job, CoordinatorError> {
        let id = parse_job_id(raw_id)?;
        self.store
            .get(id)
            .await?
            .ok_or(CoordinatorError::NotFound(id))
    }

    /// The most recent jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>, CoordinatorError> {
        Ok(self.store.list_recent(MAX_LIST_LIMIT).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_job(&self, raw_id: &str) -> Result<JobId, CoordinatorError> {
        let id = parse_job_id(raw_id)?;
        if !self.store.delete(id).await? {
            return Err(CoordinatorError::NotFound(id));
        }
        info!(job_id = %id, "job deleted");
        Ok(id)
    }

    /// Irreversibly delete every job. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn delete_all_jobs(&self) -> Result<u64, CoordinatorError> {
        let deleted = self.store.delete_all().await?;
        info!(deleted, "all jobs deleted");
        Ok(deleted)
    }
}

fn parse_job_id(raw: &str) -> Result<JobId, CoordinatorError> {
    raw.parse()
        .map_err(|_| CoordinatorError::Validation("Invalid job ID format".into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use textgate_core::{JobOutcome, JobResults};

    use super::*;
    use crate::analyzer::NotificationError;
    use crate::jobs::InMemoryJobStore;

    /// Records every request; fails them all when `fail` is set.
    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<AnalyzeRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl AnalyzerNotifier for RecordingNotifier {
        async fn notify(&self, request: &AnalyzeRequest) -> Result<(), NotificationError> {
            self.seen.lock().unwrap().push(request.clone());
            if self.fail {
                Err(NotificationError::Transport("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    /// Every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl JobStore for BrokenStore {
        async fn create(&self, _id: JobId, _text: JobText) -> Result<Job, JobStoreError> {
            Err(JobStoreError::Storage("disk on fire".into()))
        }
        async fn get(&self, _id: JobId) -> Result<Option<Job>, JobStoreError> {
            Err(JobStoreError::Storage("disk on fire".into()))
        }
        async fn list_recent(&self, _limit: usize) -> Result<Vec<JobSummary>, JobStoreError> {
            Err(JobStoreError::Storage("disk on fire".into()))
        }
        async fn delete(&self, _id: JobId) -> Result<bool, JobStoreError> {
            Err(JobStoreError::Storage("disk on fire".into()))
        }
        async fn delete_all(&self) -> Result<u64, JobStoreError> {
            Err(JobStoreError::Storage("disk on fire".into()))
        }
        async fn record_outcome(&self, id: JobId, _outcome: JobOutcome) -> Result<Job, JobStoreError> {
            Err(JobStoreError::NotFound(id))
        }
    }

    fn coordinator(fail_notify: bool) -> (JobCoordinator, Arc<InMemoryJobStore>, Arc<RecordingNotifier>) {
        let store = InMemoryJobStore::arc();
        let notifier = Arc::new(RecordingNotifier {
            fail: fail_notify,
            ..Default::default()
        });
        (JobCoordinator::new(store.clone(), notifier.clone()), store, notifier)
    }

    #[tokio::test]
    async fn submit_stores_pending_job_and_notifies_once() {
        let (coord, _store, notifier) = coordinator(false);

        let submitted = coord.submit("  hola mundo ").await.unwrap();
        assert_eq!(submitted.status, JobStatus::Pending);

        let job = coord.get_status(&submitted.id.to_string()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.text.as_str(), "hola mundo");
        assert!(job.visible_results().is_none());

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![AnalyzeRequest {
                job_id: submitted.id,
                text: "hola mundo".into()
            }]
        );
    }

    #[tokio::test]
    async fn submit_mints_fresh_ids() {
        let (coord, _store, _notifier) = coordinator(false);
        let a = coord.submit("same text").await.unwrap();
        let b = coord.submit("same text").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(coord.list_jobs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_side_effects() {
        let (coord, _store, notifier) = coordinator(false);

        for raw in ["", "   ", "\n\t"] {
            let err = coord.submit(raw).await.unwrap_err();
            assert!(matches!(err, CoordinatorError::Validation(_)));
        }
        assert!(coord.list_jobs().await.unwrap().is_empty());
        assert!(notifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_submit() {
        let (coord, _store, notifier) = coordinator(true);

        let submitted = coord.submit("still accepted").await.unwrap();
        assert_eq!(submitted.status, JobStatus::Pending);
        assert_eq!(notifier.seen.lock().unwrap().len(), 1);

        let job = coord.get_status(&submitted.id.to_string()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn store_failure_fails_submit_before_notifying() {
        let notifier = Arc::new(RecordingNotifier::default());
        let coord = JobCoordinator::new(Arc::new(BrokenStore), notifier.clone());

        let err = coord.submit("text").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Store(JobStoreError::Storage(_))));
        assert!(notifier.seen.lock().unwrap().is_empty());

        assert!(matches!(coord.list_jobs().await, Err(CoordinatorError::Store(_))));
        assert!(matches!(coord.delete_all_jobs().await, Err(CoordinatorError::Store(_))));
    }

    #[tokio::test]
    async fn malformed_ids_fail_validation_regardless_of_store() {
        let (coord, _store, _notifier) = coordinator(false);
        let broken = JobCoordinator::new(Arc::new(BrokenStore), Arc::new(RecordingNotifier::default()));

        for c in [&coord, &broken] {
            for raw in ["not-a-uuid", "123", ""] {
                assert!(matches!(c.get_status(raw).await, Err(CoordinatorError::Validation(_))));
                assert!(matches!(c.delete_job(raw).await, Err(CoordinatorError::Validation(_))));
            }
        }
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (coord, _store, _notifier) = coordinator(false);
        let unknown = JobId::new().to_string();

        assert!(matches!(coord.get_status(&unknown).await, Err(CoordinatorError::NotFound(_))));
        assert!(matches!(coord.delete_job(&unknown).await, Err(CoordinatorError::NotFound(_))));
    }

    #[tokio::test]
    async fn completed_jobs_surface_analyzer_results() {
        let (coord, store, _notifier) = coordinator(false);
        let submitted = coord.submit("great day").await.unwrap();

        let results = JobResults {
            sentiment: Some("positive".into()),
            confidence: Some(0.9),
            keywords: vec!["great".into(), "day".into()],
        };
        store
            .record_outcome(submitted.id, JobOutcome::completed(results.clone()))
            .await
            .unwrap();

        let job = coord.get_status(&submitted.id.to_string()).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.visible_results(), Some(&results));
    }

    #[tokio::test]
    async fn delete_job_removes_job_and_dependents() {
        let (coord, store, _notifier) = coordinator(false);
        let submitted = coord.submit("delete me").await.unwrap();
        store
            .record_outcome(
                submitted.id,
                JobOutcome::completed(JobResults {
                    keywords: vec!["delete".into()],
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let raw = submitted.id.to_string();
        assert_eq!(coord.delete_job(&raw).await.unwrap(), submitted.id);
        assert!(matches!(coord.get_status(&raw).await, Err(CoordinatorError::NotFound(_))));
        assert_eq!(store.keyword_rows(submitted.id).unwrap(), 0);
        assert!(matches!(coord.delete_job(&raw).await, Err(CoordinatorError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_all_reports_exact_count_then_zero() {
        let (coord, _store, _notifier) = coordinator(false);
        for i in 0..4 {
            coord.submit(&format!("job {i}")).await.unwrap();
        }

        assert_eq!(coord.delete_all_jobs().await.unwrap(), 4);
        assert!(coord.list_jobs().await.unwrap().is_empty());
        assert_eq!(coord.delete_all_jobs().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_is_capped_at_fifty_newest_first() {
        let (coord, _store, _notifier) = coordinator(false);
        let mut ids = Vec::new();
        for i in 0..55 {
            ids.push(coord.submit(&format!("job {i}")).await.unwrap().id);
        }

        let jobs = coord.list_jobs().await.unwrap();
        assert_eq!(jobs.len(), 50);
        assert_eq!(jobs.first().unwrap().id, ids[54]);
        assert_eq!(jobs.last().unwrap().id, ids[5]);
    }
}
