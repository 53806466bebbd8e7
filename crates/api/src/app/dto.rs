use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use textgate_core::{Job, JobId, JobResults, JobStatus, JobSummary};
use textgate_infra::SubmittedJob;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub text: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

impl From<SubmittedJob> for SubmitResponse {
    fn from(submitted: SubmittedJob) -> Self {
        Self {
            job_id: submitted.id,
            status: submitted.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResults>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        let results = job.visible_results().cloned();
        Self {
            job_id: job.id,
            status: job.status,
            text: job.text.into_inner(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            results,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummaryResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobSummary> for JobSummaryResponse {
    fn from(summary: JobSummary) -> Self {
        Self {
            job_id: summary.id,
            status: summary.status,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummaryResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteJobResponse {
    pub message: &'static str,
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub message: &'static str,
    pub deleted_count: u64,
}
