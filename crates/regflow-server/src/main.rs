//! regflow server
//!
//! Serves the product-registration workflow log API.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regflow_server::{
    config::{AppConfig, DatabaseConfig},
    db::{create_pool, schema::init_schema},
    nats::LogPublisher,
    router::build_router,
    services::ApplicationLogService,
    state::AppState,
    workflow::load_workflow,
};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,regflow_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect to NATS and set up the notification stream, if configured.
async fn connect_publisher(config: &AppConfig) -> Option<LogPublisher> {
    let Some(ref nats_url) = config.nats_url else {
        tracing::info!("NATS not configured, log notifications disabled");
        return None;
    };

    let client = match async_nats::connect(nats_url).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, url = %nats_url, "Failed to connect to NATS, continuing without it");
            return None;
        }
    };

    match LogPublisher::new(client, &config.nats_subject_prefix).await {
        Ok(publisher) => {
            tracing::info!(url = %nats_url, prefix = %config.nats_subject_prefix, "Connected to NATS");
            Some(publisher)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to set up NATS stream, continuing without it");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting regflow server");

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });

    let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load database config, using defaults");
        DatabaseConfig::default()
    });

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        debug = app_config.debug,
        database = %db_config.redacted_url(),
        "Configuration loaded"
    );

    // A broken workflow file is fatal: transitions cannot be validated without it
    let workflow = Arc::new(load_workflow(app_config.workflow_file.as_deref())?);

    let db_pool = create_pool(&db_config).await?;
    if app_config.auto_init_schema {
        init_schema(&db_pool).await?;
    }

    let publisher = connect_publisher(&app_config).await;

    let log_service = ApplicationLogService::new(
        db_pool.clone(),
        workflow.clone(),
        publisher.clone(),
        app_config.max_bulk_entries,
    );

    let state = AppState::new(
        db_pool,
        app_config.clone(),
        workflow,
        publisher.is_some(),
    );

    let app = build_router(state, log_service);

    let addr: SocketAddr = app_config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
