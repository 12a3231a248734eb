//! Core data model: metric batches, provider identities and cycle events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// The subsystem domain a provider generates metrics for.
///
/// The metric prefix and event key follow the wire names the monitoring
/// backend expects (`k8s.pod_failures_total`, `system.cpu_usage_percent`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Cluster,
    Database,
    Storage,
    Network,
    Host,
}

impl ProviderKind {
    /// Namespace prepended to every exported metric name.
    pub fn metric_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Cluster => "k8s",
            ProviderKind::Database => "database",
            ProviderKind::Storage => "storage",
            ProviderKind::Network => "network",
            ProviderKind::Host => "system",
        }
    }

    /// Key under which this provider's batch appears in cycle events.
    pub fn event_key(&self) -> &'static str {
        match self {
            ProviderKind::Cluster => "kubernetes",
            ProviderKind::Database => "database",
            ProviderKind::Storage => "storage",
            ProviderKind::Network => "network",
            ProviderKind::Host => "system",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_key())
    }
}

/// Flat metric mapping produced by one provider in one cycle.
///
/// Backed by a `BTreeMap` so iteration order is deterministic. Non-finite
/// values are rejected at insertion, which is the single point of entry:
/// nothing downstream needs to re-check for NaN/Inf.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricBatch(BTreeMap<String, f64>);

impl MetricBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a metric value. Non-finite values are dropped.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if !value.is_finite() {
            debug!(metric = %name, "dropping non-finite metric value");
            return;
        }
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fold another batch into this one. Later values win on name collision.
    pub fn merge(&mut self, other: MetricBatch) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

/// Clamp a derived health/performance score into [0, 100].
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Structured record emitted once per cycle, carrying every provider's batch.
#[derive(Debug, Clone, Serialize)]
pub struct CycleEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: &'static str,
    pub service: String,
    pub data: BTreeMap<&'static str, MetricBatch>,
}

impl CycleEvent {
    pub fn new(service: String, data: BTreeMap<&'static str, MetricBatch>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type: "telemetry_cycle",
            service,
            data,
        }
    }
}
