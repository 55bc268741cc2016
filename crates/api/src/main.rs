use std::time::Duration;

use anyhow::Context;

use sealgate_api::app::{build_app, services::build_services};
use sealgate_api::config::GatewayConfig;
use sealgate_api::tls;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sealgate_observability::init();
    tls::install_crypto_provider();

    let config = GatewayConfig::from_env().context("invalid configuration")?;
    let services = build_services(&config).context("failed to wire services")?;
    let app = build_app(&config, services);

    match &config.tls {
        Some(files) => {
            let rustls = tls::load(files).await?;

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            tracing::info!(addr = %config.bind, tls = true, "listening");
            axum_server::bind_rustls(config.bind, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("server error")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.bind)
                .await
                .with_context(|| format!("failed to bind {}", config.bind))?;

            tracing::info!(addr = %listener.local_addr()?, tls = false, "listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
    }

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
