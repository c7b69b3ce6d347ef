use anyhow::{anyhow, Context, Result};
use rabbitmq_stream_exporter::config::AppConfig;
use rabbitmq_stream_exporter::scrape::Scraper;
use rabbitmq_stream_exporter::server::create_router;
use rabbitmq_stream_exporter::state::ExporterState;
use rabbitmq_stream_exporter::transport::ManagementClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "error starting the exporter");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env().context("load configuration from environment")?;

    let client = ManagementClient::new(config.management_settings())
        .context("initialize RabbitMQ management API client")?;
    let endpoint = client.endpoint().to_string();

    let state = Arc::new(
        ExporterState::new(config.refresh_interval).context("register stream consumer metrics")?,
    );

    // First cycle runs right away, then every refresh interval.
    let refresh = tokio::spawn(Scraper::new(client, state.clone()).run());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind exporter address {addr}"))?;

    info!(
        port = config.port,
        api = %config.api_url,
        consumers_endpoint = %endpoint,
        basic_auth = config.has_credentials(),
        refresh_interval_ms = config.refresh_interval.as_millis() as u64,
        metrics = %format!("http://localhost:{}/metrics", config.port),
        "RabbitMQ stream exporter listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve exporter HTTP API")?;

    refresh.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "ctrl_c listener error");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM listener error");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Used when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "warn,rabbitmq_stream_exporter=info";

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("install {} log subscriber: {err}", env!("CARGO_PKG_NAME")))
}
