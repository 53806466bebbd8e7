use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use textgate_infra::{
    GatewayConfig, HttpAnalyzerNotifier, InMemoryJobStore, JobCoordinator, JobStore, PostgresJobStore,
};

/// Everything a handler needs, shared behind an `Arc`.
pub struct AppServices {
    pub coordinator: JobCoordinator,
    pub service_name: String,
}

impl AppServices {
    pub fn new(coordinator: JobCoordinator, service_name: impl Into<String>) -> Self {
        Self {
            coordinator,
            service_name: service_name.into(),
        }
    }
}

/// Wire the job store and analyzer client described by `config`.
///
/// Without `DATABASE_URL` jobs live in memory, which is only meant for local
/// development and tests.
pub async fn build_services(config: &GatewayConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn JobStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresJobStore::connect(url, config.db_max_connections)
                .await
                .context("failed to connect to Postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to prepare job tables")?;
            info!(max_connections = config.db_max_connections, "using Postgres job store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; jobs are kept in memory and lost on restart");
            InMemoryJobStore::arc()
        }
    };

    let notifier = HttpAnalyzerNotifier::new(&config.analyzer_url, config.analyzer_timeout)
        .context("failed to build analyzer client")?;
    info!(
        endpoint = notifier.endpoint(),
        timeout_secs = config.analyzer_timeout.as_secs(),
        "analyzer notifications enabled"
    );

    Ok(AppServices::new(
        JobCoordinator::new(store, Arc::new(notifier)),
        config.service_name.clone(),
    ))
}
