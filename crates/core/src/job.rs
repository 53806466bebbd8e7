//! Job record and lifecycle status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;
use crate::text::JobText;

/// Lifecycle status of a job.
///
/// The gateway only ever writes `Pending`. Every later status is written by
/// the external analyzer; values it invents are carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum JobStatus {
    /// Accepted and stored, waiting for the analyzer.
    Pending,
    /// Picked up by the analyzer.
    Processing,
    /// Analysis finished; results may be attached.
    Completed,
    /// Analysis failed.
    Error,
    /// Any other status written by the analyzer.
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Error => "ERROR",
            JobStatus::Other(s) => s,
        }
    }

    /// Parse a stored status value.
    ///
    /// Accepts the Spanish spellings still written by older analyzer builds.
    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" | "PENDIENTE" => JobStatus::Pending,
            "PROCESSING" | "PROCESANDO" => JobStatus::Processing,
            "COMPLETED" | "COMPLETADO" => JobStatus::Completed,
            "ERROR" => JobStatus::Error,
            other => JobStatus::Other(other.to_string()),
        }
    }

    /// The same status with any known spelling held in `Other` resolved to its variant.
    pub fn canonical(&self) -> JobStatus {
        JobStatus::parse(self.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.canonical(), JobStatus::Completed | JobStatus::Error)
    }

    /// Forward-only rule: nothing goes back to `Pending`, nothing leaves a terminal state.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        !self.is_terminal() && next.canonical() != JobStatus::Pending
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        JobStatus::parse(&value)
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Analysis output written by the external analyzer.
///
/// The gateway never computes or validates these values, it only surfaces them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    pub sentiment: Option<String>,
    pub confidence: Option<f64>,
    pub keywords: Vec<String>,
}

/// An update written back by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub results: JobResults,
}

impl JobOutcome {
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            results: JobResults::default(),
        }
    }

    pub fn completed(results: JobResults) -> Self {
        Self {
            status: JobStatus::Completed,
            results,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: JobStatus::Error,
            results: JobResults::default(),
        }
    }
}

/// A submitted job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub text: JobText,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only populated once the analyzer has written something.
    pub results: Option<JobResults>,
}

impl Job {
    /// A freshly submitted job in the initial state.
    pub fn new(id: JobId, text: JobText, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            results: None,
        }
    }

    /// Results to show a client; present only for completed jobs.
    pub fn visible_results(&self) -> Option<&JobResults> {
        match self.status.canonical() {
            JobStatus::Completed => self.results.as_ref(),
            _ => None,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            status: self.status.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Apply an analyzer update, refreshing `updated_at`.
    pub fn apply_outcome(&mut self, outcome: JobOutcome, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(&outcome.status) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: outcome.status.to_string(),
            });
        }
        self.status = outcome.status.canonical();
        self.results = Some(outcome.results);
        self.updated_at = now;
        Ok(())
    }
}

/// Listing row: a job without its text or results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending_job() -> Job {
        Job::new(JobId::new(), JobText::parse("hola mundo").unwrap(), Utc::now())
    }

    #[test]
    fn new_job_is_pending_without_results() {
        let job = pending_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.created_at, job.updated_at);
        assert!(job.visible_results().is_none());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Error,
            JobStatus::Other("QUEUED_REMOTE".into()),
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), status);
        }
        assert_eq!(JobStatus::parse("COMPLETADO"), JobStatus::Completed);
        assert_eq!(serde_json::to_value(JobStatus::Pending).unwrap(), "PENDING");
    }

    #[test]
    fn completion_refreshes_updated_at_and_exposes_results() {
        let mut job = pending_job();
        let later = job.created_at + Duration::seconds(3);
        let results = JobResults {
            sentiment: Some("positive".into()),
            confidence: Some(0.9),
            keywords: vec!["mundo".into()],
        };

        job.apply_outcome(JobOutcome::processing(), later).unwrap();
        assert!(job.visible_results().is_none());

        job.apply_outcome(JobOutcome::completed(results.clone()), later).unwrap();
        assert_eq!(job.updated_at, later);
        assert_eq!(job.visible_results(), Some(&results));
    }

    #[test]
    fn transitions_are_forward_only() {
        let mut job = pending_job();
        let now = Utc::now();

        let back_to_pending = JobOutcome {
            status: JobStatus::Pending,
            results: JobResults::default(),
        };
        assert!(matches!(
            job.apply_outcome(back_to_pending.clone(), now),
            Err(DomainError::InvalidTransition { .. })
        ));

        job.apply_outcome(JobOutcome::failed(), now).unwrap();
        let err = job.apply_outcome(JobOutcome::completed(JobResults::default()), now);
        assert!(matches!(err, Err(DomainError::InvalidTransition { .. })));
        assert_eq!(job.status, JobStatus::Error);
    }

    #[test]
    fn reserved_spellings_in_other_follow_the_same_rules() {
        let now = Utc::now();

        let mut job = pending_job();
        job.apply_outcome(JobOutcome::processing(), now).unwrap();
        for back in ["PENDING", "PENDIENTE"] {
            let outcome = JobOutcome {
                status: JobStatus::Other(back.into()),
                results: JobResults::default(),
            };
            assert!(matches!(
                job.apply_outcome(outcome, now),
                Err(DomainError::InvalidTransition { .. })
            ));
        }
        assert_eq!(job.status, JobStatus::Processing);

        let results = JobResults {
            sentiment: Some("neutral".into()),
            confidence: Some(0.5),
            keywords: vec![],
        };
        job.apply_outcome(
            JobOutcome {
                status: JobStatus::Other("COMPLETED".into()),
                results: results.clone(),
            },
            now,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.visible_results(), Some(&results));
        assert!(job.apply_outcome(JobOutcome::processing(), now).is_err());

        assert!(JobStatus::Other("COMPLETADO".into()).is_terminal());
    }
}
