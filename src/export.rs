//! Export sinks: the metric/event exporter boundary and the structured
//! event log.
//!
//! Both sinks are fire-and-forget. Implementations must never surface an
//! error back into the cycle orchestrator; a sink that cannot deliver simply
//! drops the record.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ExporterConfig;
use crate::metrics::CycleEvent;

/// Monitoring backend boundary, accepting named numeric metrics and named
/// structured events.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn record_metric(&self, name: &str, value: f64);
    async fn record_event(&self, event_type: &str, attributes: Value);
}

/// Exporter that writes through the tracing pipeline.
pub struct LogExporter;

#[async_trait]
impl Exporter for LogExporter {
    async fn record_metric(&self, name: &str, value: f64) {
        debug!(target: "telesim::export", metric = name, value, "metric recorded");
    }

    async fn record_event(&self, event_type: &str, attributes: Value) {
        info!(target: "telesim::export", event = event_type, %attributes, "event recorded");
    }
}

/// Exporter used when export is disabled; every call is a safe no-op.
pub struct NoopExporter;

#[async_trait]
impl Exporter for NoopExporter {
    async fn record_metric(&self, _name: &str, _value: f64) {}

    async fn record_event(&self, _event_type: &str, _attributes: Value) {}
}

/// Select the exporter once at construction time.
pub fn build_exporter(config: &ExporterConfig) -> Arc<dyn Exporter> {
    if config.enabled {
        Arc::new(LogExporter)
    } else {
        warn!("metric export disabled; recording to no-op sink");
        Arc::new(NoopExporter)
    }
}

/// Structured per-cycle event stream.
pub trait EventLog: Send + Sync {
    fn emit(&self, event: &CycleEvent);
}

/// Event log that serializes one JSON record per cycle to the log stream.
pub struct JsonEventLog;

impl EventLog for JsonEventLog {
    fn emit(&self, event: &CycleEvent) {
        match serde_json::to_string(event) {
            Ok(line) => info!(target: "telesim::events", "{line}"),
            Err(e) => error!(target: "telesim::events", error = %e, "failed to serialize cycle event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExporterConfig;

    #[tokio::test]
    async fn test_noop_exporter_accepts_everything() {
        let exporter = NoopExporter;
        exporter.record_metric("k8s.pod_failures_total", 1.0).await;
        exporter
            .record_event("TelemetryCycle", serde_json::json!({"duration_ms": 12.0}))
            .await;
    }

    #[test]
    fn test_build_exporter_respects_enabled_flag() {
        let enabled = ExporterConfig {
            enabled: true,
            ..ExporterConfig::default()
        };
        let disabled = ExporterConfig {
            enabled: false,
            ..ExporterConfig::default()
        };

        // Only checking construction succeeds for both paths.
        let _ = build_exporter(&enabled);
        let _ = build_exporter(&disabled);
    }
}
