use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

use telesim::config::AppConfig;
use telesim::export::{build_exporter, JsonEventLog};
use telesim::logging::init_logging;
use telesim::providers::{
    ClusterProvider, DatabaseProvider, HostProvider, NetworkProvider, Provider, StorageProvider,
};
use telesim::worker::TelemetryWorker;

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(e) = config.ensure_valid() {
        error!("{e}");
        process::exit(1);
    }

    info!(
        worker_id = %config.worker_id,
        environment = %config.environment,
        interval_secs = config.monitoring.interval_secs,
        export_enabled = config.exporter.enabled,
        "starting telemetry worker service"
    );

    let exporter = build_exporter(&config.exporter);
    let event_log = Arc::new(JsonEventLog);

    let sim = &config.simulation;
    let mut providers: Vec<Box<dyn Provider>> = Vec::new();
    if sim.enable_kubernetes {
        providers.push(Box::new(ClusterProvider::new(sim)));
    }
    if sim.enable_database {
        providers.push(Box::new(DatabaseProvider::new(sim)));
    }
    if sim.enable_storage {
        providers.push(Box::new(StorageProvider::new(sim)));
    }
    if sim.enable_network {
        providers.push(Box::new(NetworkProvider::new(sim)));
    }
    if sim.enable_system {
        providers.push(Box::new(HostProvider::new(sim)));
    }
    if providers.is_empty() {
        warn!("all providers disabled; cycles will emit empty events");
    }

    let mut worker = TelemetryWorker::new(
        providers,
        exporter,
        event_log,
        config.exporter.app_name.clone(),
        config.interval(),
    );
    let handle = worker.handle();

    let worker_task = tokio::spawn(async move {
        worker.run().await;
    });

    wait_for_shutdown().await;
    info!("shutdown signal received, stopping worker");
    handle.stop();

    // The in-flight cycle (or inter-cycle sleep) is allowed to finish.
    if let Err(e) = worker_task.await {
        error!(error = %e, "worker task terminated abnormally");
    }
    info!("telemetry worker shutdown complete");
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C");
    }
}
