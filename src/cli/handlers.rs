use crate::config::ServiceConfig;
use crate::server::RequestProcessor;
use crate::service::ModelGatewayService;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: console always, plus `<log_dir>/mlgateway.log`
/// when a directory is given. Keep the returned guard alive to flush the file writer.
pub fn init_logging(level: &str, filter: Option<&str>, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level: Level = level.parse().unwrap_or(Level::INFO);
    let env_filter = || {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .parse_lossy(filter.unwrap_or(""))
    };

    let console = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let file_appender = RollingFileAppender::new(Rotation::NEVER, dir, "mlgateway.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact();
            tracing_subscriber::registry()
                .with(env_filter())
                .with(console)
                .with(file)
                .try_init()
                .context("Failed to initialize logging")?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(console)
                .try_init()
                .context("Failed to initialize logging")?;
            Ok(None)
        }
    }
}

pub async fn run_server(config: ServiceConfig) -> Result<()> {
    let processor = RequestProcessor::from_config(&config).with_context(|| {
        format!(
            "Failed to open model registry in {}",
            config.storage.models_dir.display()
        )
    })?;
    info!(
        "Model registry at {} holds {} models",
        config.storage.models_dir.display(),
        processor.registry().model_count()
    );

    let addr = config.listen_addr().context("Invalid listen address")?;
    let service = ModelGatewayService::new(Arc::new(processor)).into_server(config.max_message_size());

    info!("Starting server on {}", addr);
    Server::builder()
        .add_service(service)
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received, draining connections");
}
