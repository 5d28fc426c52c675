mod config;

use std::sync::Arc;

use cbexporter_client::{ClusterApi, RestClient};
use cbexporter_collectors::{PerNodeBucketCollector, PerNodeBucketMetrics};
use cbexporter_common::status::CollectorStatus;
use cbexporter_metrics::{ExporterState, MetricsRegistry, exporter_router};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, process_env};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log_level))?;
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let client_config = cli.client_config(process_env);
    let client: Arc<dyn ClusterApi> = Arc::new(RestClient::new(&client_config)?);
    info!(
        address = %client_config.address,
        port = client_config.port,
        "using couchbase cluster"
    );

    let registry = Arc::new(MetricsRegistry::new());
    let metrics = Arc::new(PerNodeBucketMetrics::register(registry.as_ref())?);
    let status = Arc::new(CollectorStatus::new());
    let state = Arc::new(ExporterState::new(
        Arc::clone(&registry),
        Arc::clone(&status),
        cli.token(process_env),
    )?);
    if state.token.is_some() {
        info!("bearer token required on /metrics");
    }

    let collector = PerNodeBucketCollector::new(client, metrics, status, cli.collector_settings());
    // Startup failures are logged by the collector; the server keeps serving.
    let startup = tokio::spawn(async move { collector.run().await.ok() });

    let addr = cli.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("cbexporter listening on {addr}");
    axum::serve(listener, exporter_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if startup.is_finished() {
        if let Ok(Some(handle)) = startup.await {
            handle.stop().await;
        }
    } else {
        startup.abort();
    }

    info!("cbexporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
