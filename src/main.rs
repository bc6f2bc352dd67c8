use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dill_monitor::config::{default_address_book_path, default_server_config_path};
use dill_monitor::metrics::install_exporter;
use dill_monitor::telemetry::init_tracing;
use dill_monitor::{
    AddressBook, AddressStore, HttpUpstreamClient, PrometheusSink, Scheduler, SchedulerConfig,
    ServerConfig,
};

/// Prometheus exporter for DILL wallet, staking and validator metrics
#[derive(Parser, Debug)]
#[command(name = "dill-monitor", version, about)]
struct Cli {
    /// Address book (defaults to ~/.dill_monitor/config.json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server settings (defaults to ~/.dill_monitor/server_config.json)
    #[arg(long, value_name = "FILE")]
    server_config: Option<PathBuf>,

    /// Override the collection interval
    #[arg(long, value_name = "SECS")]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let server_path = cli.server_config.unwrap_or_else(default_server_config_path);
    let (mut server, server_error) = match ServerConfig::load(&server_path) {
        Ok(server) => (server, None),
        Err(e) => (ServerConfig::default(), Some(e)),
    };
    if let Some(interval_secs) = cli.interval_secs.filter(|secs| *secs > 0) {
        server.scheduler.interval_secs = interval_secs;
    }

    init_tracing(&server.log_level).context("failed to initialise logging")?;
    if let Some(e) = server_error {
        warn!(path = %server_path.display(), error = %e, "using default server config");
    }

    let book_path = cli.config.unwrap_or_else(default_address_book_path);
    let book = AddressBook::load(&book_path)
        .with_context(|| format!("failed to load address config from {}", book_path.display()))?;
    info!(
        addresses = book.len(),
        validators = book.validator_count(),
        path = %book_path.display(),
        "address config loaded"
    );

    let listen = server.listen_addr().context("invalid metrics listen address")?;
    install_exporter(listen).context("failed to start metrics exporter")?;

    let client =
        HttpUpstreamClient::new(server.upstream.clone()).context("failed to build HTTP client")?;
    let scheduler_config = SchedulerConfig::from(&server.scheduler);
    let grace_period = scheduler_config.grace_period;
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(client),
        Arc::new(AddressStore::new()),
        Arc::new(PrometheusSink::new()),
        book.addresses,
        scheduler_config,
    ));

    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::select! {
        _ = shutdown_signal() => info!("shutdown signal received"),
        joined = &mut handle => {
            if let Err(e) = joined {
                error!(error = %e, "scheduler task failed");
            }
            return Ok(());
        }
    }

    cancel.cancel();
    match tokio::time::timeout(grace_period + Duration::from_secs(1), handle).await {
        Ok(Ok(())) => info!("shutdown complete"),
        Ok(Err(e)) => error!(error = %e, "scheduler task failed during shutdown"),
        Err(_) => warn!("scheduler did not stop within the grace period"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
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
}
