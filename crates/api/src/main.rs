use anyhow::Context;

use textgate_infra::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    textgate_observability::init();

    let config = GatewayConfig::from_env().context("invalid configuration")?;
    let app = textgate_api::app::build_app(&config).await?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = signal_or_never("ctrl-c", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}

/// Resolves when `signal` fires. A handler that cannot be installed never resolves.
async fn signal_or_never<F>(name: &str, signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "cannot listen for {name}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn failed_handler_never_triggers_shutdown() {
        let broken = async { Err(std::io::Error::other("no signal support")) };
        let waited = tokio::time::timeout(Duration::from_millis(50), signal_or_never("test", broken)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn delivered_signal_triggers_shutdown() {
        let fired = async { Ok(()) };
        let waited = tokio::time::timeout(Duration::from_millis(50), signal_or_never("test", fired)).await;
        assert!(waited.is_ok());
    }
}
