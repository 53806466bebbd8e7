//! Outbound notification to the external analysis service.
//!
//! One `POST {base}/api/analyze` per submitted job, bounded by a client-wide
//! timeout. Callers get an explicit `Result` and decide what to do with it;
//! nothing here retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use textgate_core::JobId;

/// Body sent to the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub job_id: JobId,
    pub text: String,
}

/// Why a notification did not get through.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("analyzer did not answer within {0:?}")]
    Timeout(Duration),
    #[error("analyzer unreachable: {0}")]
    Transport(String),
    #[error("analyzer answered with status {0}")]
    Rejected(u16),
}

/// Delivers "please analyse this job" to the analyzer.
#[async_trait]
pub trait AnalyzerNotifier: Send + Sync {
    async fn notify(&self, request: &AnalyzeRequest) -> Result<(), NotificationError>;
}

/// Analyzer notifier over HTTP (reqwest).
#[derive(Debug, Clone)]
pub struct HttpAnalyzerNotifier {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpAnalyzerNotifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/analyze", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalyzerNotifier for HttpAnalyzerNotifier {
    async fn notify(&self, request: &AnalyzeRequest) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout(self.timeout)
                } else {
                    NotificationError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        debug!(job_id = %request.job_id, endpoint = %self.endpoint, "analyzer notified");
        Ok(())
    }
}
