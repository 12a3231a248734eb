//! Integration tests for cycle orchestration: provider isolation, metric
//! namespacing and the scheduled run loop.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use telesim::config::SimulationConfig;
use telesim::export::{EventLog, Exporter};
use telesim::metrics::{CycleEvent, MetricBatch, ProviderKind};
use telesim::providers::{
    ClusterProvider, DatabaseProvider, NetworkProvider, Provider, StorageProvider,
};
use telesim::worker::TelemetryWorker;
use telesim::{Result, TelesimError};

#[derive(Default)]
struct RecordingExporter {
    metrics: Mutex<Vec<(String, f64)>>,
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingExporter {
    fn metric_names(&self) -> Vec<String> {
        self.metrics
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn event_count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(ty, _)| ty == event_type)
            .count()
    }

    fn events_of(&self, event_type: &str) -> Vec<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(ty, _)| ty == event_type)
            .map(|(_, attrs)| attrs.clone())
            .collect()
    }
}

#[async_trait]
impl Exporter for RecordingExporter {
    async fn record_metric(&self, name: &str, value: f64) {
        self.metrics.lock().unwrap().push((name.to_string(), value));
    }

    async fn record_event(&self, event_type: &str, attributes: Value) {
        self.events
            .lock()
            .unwrap()
            .push((event_type.to_string(), attributes));
    }
}

#[derive(Default)]
struct RecordingEventLog {
    events: Mutex<Vec<CycleEvent>>,
}

impl RecordingEventLog {
    fn cycle_events(&self) -> Vec<CycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventLog for RecordingEventLog {
    fn emit(&self, event: &CycleEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Deterministic provider producing a tiny fixed batch.
struct StubProvider {
    kind: ProviderKind,
}

impl Provider for StubProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn produce(&mut self) -> Result<MetricBatch> {
        let mut batch = MetricBatch::new();
        batch.insert("operations_total", 10.0);
        batch.insert("health_score", 95.0);
        Ok(batch)
    }
}

/// Provider that fails every cycle.
struct FailingProvider;

impl Provider for FailingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Database
    }

    fn produce(&mut self) -> Result<MetricBatch> {
        Err(TelesimError::Provider {
            provider: "database".to_string(),
            reason: "forced failure".to_string(),
        })
    }
}

fn all_stub_providers() -> Vec<Box<dyn Provider>> {
    [
        ProviderKind::Cluster,
        ProviderKind::Database,
        ProviderKind::Storage,
        ProviderKind::Network,
        ProviderKind::Host,
    ]
    .into_iter()
    .map(|kind| Box::new(StubProvider { kind }) as Box<dyn Provider>)
    .collect()
}

fn worker_with(
    providers: Vec<Box<dyn Provider>>,
    interval: Duration,
) -> (
    TelemetryWorker,
    Arc<RecordingExporter>,
    Arc<RecordingEventLog>,
) {
    let exporter = Arc::new(RecordingExporter::default());
    let event_log = Arc::new(RecordingEventLog::default());
    let worker = TelemetryWorker::new(
        providers,
        Arc::clone(&exporter) as Arc<dyn Exporter>,
        Arc::clone(&event_log) as Arc<dyn EventLog>,
        "telesim-worker".to_string(),
        interval,
    );
    (worker, exporter, event_log)
}

#[tokio::test]
async fn failing_provider_is_isolated_from_the_rest() {
    let config = SimulationConfig::default();
    let providers: Vec<Box<dyn Provider>> = vec![
        Box::new(ClusterProvider::with_rng(&config, StdRng::seed_from_u64(1))),
        Box::new(FailingProvider),
        Box::new(StorageProvider::with_rng(&config, StdRng::seed_from_u64(2))),
        Box::new(NetworkProvider::with_rng(&config, StdRng::seed_from_u64(3))),
        Box::new(StubProvider {
            kind: ProviderKind::Host,
        }),
    ];
    let (mut worker, exporter, event_log) = worker_with(providers, Duration::from_secs(10));

    let cycles = 5;
    for _ in 0..cycles {
        let summary = worker.run_cycle().await.unwrap();
        assert_eq!(summary.provider_failures, 1);
        assert!(summary.metrics_collected > 0);
    }

    // One TelemetryError per cycle, never a crashed cycle.
    assert_eq!(exporter.event_count("TelemetryError"), cycles);
    assert_eq!(exporter.event_count("TelemetryCycle"), cycles);
    for error in exporter.events_of("TelemetryError") {
        assert_eq!(error["error_type"], "provider");
        assert!(error["error_message"]
            .as_str()
            .unwrap()
            .contains("forced failure"));
    }

    // The four healthy providers still land in every cycle event.
    for event in event_log.cycle_events() {
        assert_eq!(event.data.len(), 4);
        assert!(event.data.contains_key("kubernetes"));
        assert!(event.data.contains_key("storage"));
        assert!(event.data.contains_key("network"));
        assert!(event.data.contains_key("system"));
        assert!(!event.data.contains_key("database"));
    }
}

#[tokio::test]
async fn metrics_are_namespaced_by_provider() {
    let config = SimulationConfig::default();
    let providers: Vec<Box<dyn Provider>> = vec![
        Box::new(ClusterProvider::with_rng(&config, StdRng::seed_from_u64(1))),
        Box::new(DatabaseProvider::with_rng(&config, StdRng::seed_from_u64(2))),
    ];
    let (mut worker, exporter, _) = worker_with(providers, Duration::from_secs(10));

    worker.run_cycle().await.unwrap();

    let names = exporter.metric_names();
    assert!(!names.is_empty());
    assert!(names
        .iter()
        .all(|name| name.starts_with("k8s.") || name.starts_with("database.")));
    assert!(names.iter().any(|name| name == "k8s.cluster_health_score"));
    assert!(names
        .iter()
        .any(|name| name == "database.database_health_score"));
}

#[tokio::test]
async fn cycle_summary_counts_every_exported_metric() {
    let (mut worker, exporter, _) = worker_with(all_stub_providers(), Duration::from_secs(10));

    let summary = worker.run_cycle().await.unwrap();
    assert_eq!(summary.metrics_collected, 10); // 5 providers x 2 metrics
    assert_eq!(exporter.metric_names().len(), 10);

    let cycle_events = exporter.events_of("TelemetryCycle");
    assert_eq!(cycle_events.len(), 1);
    assert_eq!(cycle_events[0]["metrics_collected"], 10);
    assert!(cycle_events[0]["duration_ms"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn empty_provider_list_still_emits_cycle_records() {
    let (mut worker, exporter, event_log) = worker_with(Vec::new(), Duration::from_secs(10));

    let summary = worker.run_cycle().await.unwrap();
    assert_eq!(summary.metrics_collected, 0);
    assert_eq!(exporter.event_count("TelemetryCycle"), 1);

    let events = event_log.cycle_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, BTreeMap::new());
}

#[tokio::test(start_paused = true)]
async fn run_loop_executes_three_cycles_then_stops() {
    let (worker, exporter, event_log) = worker_with(all_stub_providers(), Duration::from_secs(10));
    let handle = worker.handle();

    let mut worker = worker;
    let task = tokio::spawn(async move {
        worker.run().await;
    });

    // The paused clock auto-advances through the jittered inter-cycle
    // sleeps; stop as soon as the third cycle has been exported.
    loop {
        if exporter.event_count("TelemetryCycle") >= 3 {
            handle.stop();
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    task.await.unwrap();

    assert_eq!(handle.cycles(), 3);
    assert!(!handle.is_running());
    assert_eq!(exporter.event_count("TelemetryCycle"), 3);
    assert_eq!(exporter.event_count("TelemetryError"), 0);
    assert_eq!(event_log.cycle_events().len(), 3);
    for event in event_log.cycle_events() {
        assert_eq!(event.event_type, "telemetry_cycle");
        assert_eq!(event.service, "telesim-worker");
        assert_eq!(event.data.len(), 5);
    }
}

#[tokio::test]
async fn stop_before_run_prevents_any_cycle() {
    let (worker, exporter, _) = worker_with(all_stub_providers(), Duration::from_secs(10));
    let handle = worker.handle();
    handle.stop();

    let mut worker = worker;
    worker.run().await;

    assert_eq!(handle.cycles(), 0);
    assert_eq!(exporter.event_count("TelemetryCycle"), 0);
}
