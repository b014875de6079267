//! Projection worker entry point.

use std::error::Error;

use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::config::{Config, LogFormat};

const DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Runs the processor loop and the HTTP server over `event_store` until a
/// shutdown signal arrives.
async fn serve<S: EventStore + 'static>(
    event_store: S,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), Box<dyn Error>> {
    let state = worker::create_state(event_store, config.processor_config());

    // Replay whatever is already in the log before accepting traffic.
    match state.processor.run_catch_up().await {
        Ok(applied) => tracing::info!(events = applied, "initial catch-up complete"),
        Err(e) => tracing::warn!(error = %e, "initial catch-up failed"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let processor = state.processor.clone();
    let processor_task = tokio::spawn(async move { processor.run(shutdown_rx).await });

    let app = worker::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting worker");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = shutdown_tx.send(true) {
        tracing::debug!(error = %e, "projection processor already stopped");
    }
    if let Err(e) = processor_task.await {
        tracing::error!(error = %e, "projection processor task failed");
    }

    tracing::info!("worker shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env();

    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresEventStore::connect(url, DATABASE_MAX_CONNECTIONS).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL event store");
            serve(store, &config, metrics_handle).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory event store");
            serve(InMemoryEventStore::new(), &config, metrics_handle).await
        }
    }
}
