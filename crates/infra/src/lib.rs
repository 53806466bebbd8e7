//! Infrastructure layer: job storage, analyzer client, coordinator, config.

pub mod analyzer;
pub mod config;
pub mod coordinator;
pub mod jobs;

pub use analyzer::{AnalyzeRequest, AnalyzerNotifier, HttpAnalyzerNotifier, NotificationError};
pub use config::{ConfigError, GatewayConfig};
pub use coordinator::{CoordinatorError, JobCoordinator, SubmittedJob};
pub use jobs::{InMemoryJobStore, JobStore, JobStoreError, PostgresJobStore};
