pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod providers;
pub mod worker;

pub use config::AppConfig;
pub use error::{Result, TelesimError};
pub use export::{build_exporter, EventLog, Exporter, JsonEventLog, LogExporter, NoopExporter};
pub use metrics::{CycleEvent, MetricBatch, ProviderKind};
pub use providers::{
    ClusterProvider, DatabaseProvider, HostProvider, NetworkProvider, Provider, StorageProvider,
};
pub use worker::{CycleSummary, TelemetryWorker, WorkerHandle};
