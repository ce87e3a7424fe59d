//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use common::SystemClock;
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use fulfillment::LogNotifier;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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

async fn serve<S, D>(config: &Config, event_store: S, documents: D, metrics_handle: PrometheusHandle)
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    let state = api::create_state(
        event_store,
        documents,
        Arc::new(LogNotifier),
        Arc::new(SystemClock),
        config.engine_settings(),
    );

    // Fold any journal that already exists before taking traffic
    state
        .projection_processor
        .run_catch_up()
        .await
        .expect("catch-up failed");

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let event_store = PostgresEventStore::new(pool.clone());
            event_store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL stores");
            serve(&config, event_store, PostgresDocumentStore::new(pool), metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory stores");
            serve(
                &config,
                InMemoryEventStore::new(),
                InMemoryDocumentStore::new(),
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}
