//! Kubernetes cluster simulation: pod lifecycle, scheduling, crashes and
//! resource drift.
//!
//! The pod table is the only cross-cycle state in the synthetic providers.
//! It is created with a fixed baseline fleet and only ever grows.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{chance, uniform, Provider};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::metrics::{clamp_score, MetricBatch, ProviderKind};

/// Chance of scheduling a new pod each cycle
const NEW_POD_PROBABILITY: f64 = 0.1;
/// Per-pod failure odds = FAILURE_ODDS_SCALE * error_rate_variance
const FAILURE_ODDS_SCALE: f64 = 0.4;
/// Chance a failed pod restarts within the same cycle
const RESTART_PROBABILITY: f64 = 0.8;
/// Health score penalty weights
const RESTART_RATE_PENALTY: f64 = 40.0;
const INGRESS_ERROR_PENALTY: f64 = 2.0;

const NAMESPACES: [&str; 4] = ["default", "kube-system", "monitoring", "ingress"];

/// (deployment, namespace, replicas)
const BASELINE_FLEET: [(&str, &str, u32); 7] = [
    ("api-server", "default", 3),
    ("web-frontend", "default", 5),
    ("worker-service", "default", 8),
    ("redis-cache", "default", 2),
    ("prometheus", "monitoring", 1),
    ("grafana", "monitoring", 1),
    ("nginx-ingress", "ingress", 3),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PodPhase {
    Pending,
    Running,
    Failed,
}

#[derive(Debug, Clone)]
struct PodState {
    namespace: String,
    phase: PodPhase,
    restart_count: u32,
    /// Percent, random-walks within [5, 95]
    cpu_usage: f64,
    /// MB, random-walks within [50, 1000]
    memory_usage: f64,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

pub struct ClusterProvider {
    pods: BTreeMap<String, PodState>,
    rng: StdRng,
    failure_probability: f64,
    next_dynamic_pod: u64,
}

impl ClusterProvider {
    pub fn new(config: &SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &SimulationConfig, mut rng: StdRng) -> Self {
        let mut pods = BTreeMap::new();
        for (deployment, namespace, replicas) in BASELINE_FLEET {
            for i in 0..replicas {
                let age_days = rng.gen_range(1..=30);
                pods.insert(
                    format!("{deployment}-{i}"),
                    PodState {
                        namespace: namespace.to_string(),
                        phase: PodPhase::Running,
                        restart_count: rng.gen_range(0..=5),
                        cpu_usage: rng.gen_range(10.0..80.0),
                        memory_usage: rng.gen_range(100.0..800.0),
                        created_at: Utc::now() - ChronoDuration::days(age_days),
                    },
                );
            }
        }

        Self {
            pods,
            rng,
            failure_probability: FAILURE_ODDS_SCALE * config.error_rate_variance,
            next_dynamic_pod: 0,
        }
    }

    /// Pending pods become Running at the start of the next cycle.
    fn promote_pending(&mut self) {
        for pod in self.pods.values_mut() {
            if pod.phase == PodPhase::Pending {
                pod.phase = PodPhase::Running;
            }
        }
    }

    fn simulate_scheduling(&mut self, batch: &mut MetricBatch) {
        if chance(&mut self.rng, NEW_POD_PROBABILITY) {
            self.next_dynamic_pod += 1;
            let pod_name = format!("dynamic-pod-{}", self.next_dynamic_pod);
            let scheduling_time = self.rng.gen_range(1.5..8.0);
            let namespace = NAMESPACES[self.rng.gen_range(0..NAMESPACES.len())];

            self.pods.insert(
                pod_name.clone(),
                PodState {
                    namespace: namespace.to_string(),
                    phase: PodPhase::Pending,
                    restart_count: 0,
                    cpu_usage: 5.0,
                    memory_usage: 50.0,
                    created_at: Utc::now(),
                },
            );
            info!(pod = %pod_name, namespace, "scheduled new pod");

            batch.insert("pod_scheduling_time_seconds", scheduling_time);
            batch.insert("pods_scheduled_total", 1.0);

            // Scheduling completes within the cycle: Pending -> Running.
            if let Some(pod) = self.pods.get_mut(&pod_name) {
                pod.phase = PodPhase::Running;
            }
        } else {
            batch.insert("pods_scheduled_total", 0.0);
        }
    }

    fn simulate_failures(&mut self, batch: &mut MetricBatch) {
        let running: Vec<String> = self
            .pods
            .iter()
            .filter(|(_, p)| p.phase == PodPhase::Running)
            .map(|(name, _)| name.clone())
            .collect();

        let mut failures = 0u32;
        for name in &running {
            if !chance(&mut self.rng, self.failure_probability) {
                continue;
            }
            failures += 1;
            let restarted = chance(&mut self.rng, RESTART_PROBABILITY);
            if let Some(pod) = self.pods.get_mut(name) {
                pod.phase = PodPhase::Failed;
                pod.restart_count += 1;
                warn!(pod = %name, "pod failed");
                if restarted {
                    pod.phase = PodPhase::Running;
                    info!(pod = %name, "pod restarted");
                }
            }
        }

        batch.insert("pod_failures_total", failures as f64);
        batch.insert(
            "pod_restart_rate",
            failures as f64 / running.len().max(1) as f64,
        );
    }

    fn simulate_resource_usage(&mut self, batch: &mut MetricBatch) {
        let mut total_cpu = 0.0;
        let mut total_memory = 0.0;
        let mut running = 0u32;

        for pod in self.pods.values_mut() {
            if pod.phase != PodPhase::Running {
                continue;
            }
            let cpu_change = self.rng.gen_range(-5.0..15.0);
            let memory_change = self.rng.gen_range(-20.0..50.0);
            pod.cpu_usage = (pod.cpu_usage + cpu_change).clamp(5.0, 95.0);
            pod.memory_usage = (pod.memory_usage + memory_change).clamp(50.0, 1000.0);

            total_cpu += pod.cpu_usage;
            total_memory += pod.memory_usage;
            running += 1;
        }

        if running > 0 {
            batch.insert("average_cpu_usage_percent", total_cpu / running as f64);
            batch.insert("average_memory_usage_mb", total_memory / running as f64);
        } else {
            batch.insert("average_cpu_usage_percent", 0.0);
            batch.insert("average_memory_usage_mb", 0.0);
        }
        batch.insert("total_running_pods", running as f64);
    }

    fn simulate_networking(&mut self, batch: &mut MetricBatch) {
        batch.insert(
            "service_discovery_latency_ms",
            self.rng.gen_range(5.0..50.0),
        );
        batch.insert("dns_resolution_time_ms", self.rng.gen_range(1.0..15.0));
        batch.insert("ingress_request_rate", self.rng.gen_range(100.0..1000.0));
        batch.insert("ingress_error_rate", self.rng.gen_range(0.1..5.0));
    }

    #[cfg(test)]
    fn pod_count(&self) -> usize {
        self.pods.len()
    }
}

impl Provider for ClusterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cluster
    }

    fn produce(&mut self) -> Result<MetricBatch> {
        self.promote_pending();

        let mut batch = MetricBatch::new();
        self.simulate_scheduling(&mut batch);
        self.simulate_failures(&mut batch);
        self.simulate_resource_usage(&mut batch);
        self.simulate_networking(&mut batch);

        // Cluster-wide roll-ups
        let restart_rate = batch.get("pod_restart_rate").unwrap_or(0.0);
        let ingress_errors = batch.get("ingress_error_rate").unwrap_or(0.0);
        batch.insert(
            "cluster_health_score",
            clamp_score(
                100.0 - restart_rate * RESTART_RATE_PENALTY - ingress_errors * INGRESS_ERROR_PENALTY,
            ),
        );
        batch.insert("api_server_latency_ms", uniform(&mut self.rng, 10.0, 100.0));

        Ok(batch)
    }
}
