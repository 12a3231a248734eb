//! Relational database simulation: query performance, connection pool,
//! transactions, maintenance and error conditions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::{chance, uniform, Provider};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::metrics::{clamp_score, MetricBatch, ProviderKind};

const POOL_SIZE: u32 = 20;
/// Pool utilization above this fraction switches wait times to the elevated regime
const POOL_PRESSURE_THRESHOLD: f64 = 0.8;
/// Connection-issue odds = CONNECTION_ISSUE_SCALE * error_rate_variance
const CONNECTION_ISSUE_SCALE: f64 = 0.4;
/// Latency penalty divisor in the health formula
const LATENCY_PENALTY_DIVISOR: f64 = 10.0;

struct QueryKind {
    name: &'static str,
    min_ms: f64,
    max_ms: f64,
    weight: f64,
}

const QUERY_KINDS: [QueryKind; 6] = [
    QueryKind { name: "select", min_ms: 2.0, max_ms: 50.0, weight: 0.6 },
    QueryKind { name: "insert", min_ms: 5.0, max_ms: 100.0, weight: 0.15 },
    QueryKind { name: "update", min_ms: 10.0, max_ms: 200.0, weight: 0.1 },
    QueryKind { name: "delete", min_ms: 8.0, max_ms: 150.0, weight: 0.05 },
    QueryKind { name: "join", min_ms: 20.0, max_ms: 500.0, weight: 0.08 },
    QueryKind { name: "aggregate", min_ms: 50.0, max_ms: 1000.0, weight: 0.02 },
];

const ERROR_TYPES: [&str; 4] = [
    "syntax_error",
    "constraint_violation",
    "timeout",
    "permission_denied",
];

pub struct DatabaseProvider {
    /// Persists across cycles, random-walks within [1, POOL_SIZE]
    active_connections: u32,
    rng: StdRng,
    error_rate_variance: f64,
    /// Slow queries escalate into [max, max * (1 + 10 * performance_variance)]
    spike_width: f64,
}

impl DatabaseProvider {
    pub fn new(config: &SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &SimulationConfig, mut rng: StdRng) -> Self {
        let active_connections = rng.gen_range(5..=15);
        Self {
            active_connections,
            rng,
            error_rate_variance: config.error_rate_variance,
            spike_width: 1.0 + 10.0 * config.performance_variance,
        }
    }

    fn simulate_query_performance(&mut self, batch: &mut MetricBatch) {
        let mut total_queries = 0u32;
        let mut total_time = 0.0;
        let mut slow_queries = 0u32;

        for kind in &QUERY_KINDS {
            let count = (self.rng.gen_range(10.0..100.0) * kind.weight) as u32;
            let mut kind_time = 0.0;

            for _ in 0..count {
                let exec_time = if chance(&mut self.rng, self.error_rate_variance) {
                    slow_queries += 1;
                    uniform(&mut self.rng, kind.max_ms, kind.max_ms * self.spike_width)
                } else {
                    self.rng.gen_range(kind.min_ms..kind.max_ms)
                };
                kind_time += exec_time;
            }

            total_queries += count;
            total_time += kind_time;
            batch.insert(
                format!("{}_avg_time_ms", kind.name),
                kind_time / count.max(1) as f64,
            );
            batch.insert(format!("{}_count", kind.name), count as f64);
        }

        batch.insert("total_queries", total_queries as f64);
        batch.insert(
            "average_query_time_ms",
            total_time / total_queries.max(1) as f64,
        );
        batch.insert("slow_queries_count", slow_queries as f64);
        batch.insert(
            "slow_query_percentage",
            slow_queries as f64 / total_queries.max(1) as f64 * 100.0,
        );
    }

    fn simulate_connection_management(&mut self, batch: &mut MetricBatch) {
        let delta: i64 = self.rng.gen_range(-3..=5);
        let next = (self.active_connections as i64 + delta).clamp(1, POOL_SIZE as i64);
        self.active_connections = next as u32;

        batch.insert("active_connections", self.active_connections as f64);
        batch.insert(
            "connection_pool_utilization",
            self.active_connections as f64 / POOL_SIZE as f64 * 100.0,
        );
        batch.insert("max_connections", POOL_SIZE as f64);

        let connection_errors =
            if chance(&mut self.rng, CONNECTION_ISSUE_SCALE * self.error_rate_variance) {
                let errors = self.rng.gen_range(1..=5);
                warn!(errors, "database connection errors detected");
                errors
            } else {
                0
            };
        batch.insert("connection_errors", connection_errors as f64);

        let wait_time =
            if self.active_connections as f64 > POOL_SIZE as f64 * POOL_PRESSURE_THRESHOLD {
                self.rng.gen_range(10.0..100.0)
            } else {
                self.rng.gen_range(0.0..5.0)
            };
        batch.insert("connection_wait_time_ms", wait_time);
    }

    fn simulate_transactions(&mut self, batch: &mut MetricBatch) {
        let transactions: u32 = self.rng.gen_range(50..=300);
        let commits = (transactions as f64 * self.rng.gen_range(0.92..0.98)) as u32;
        let rollbacks = transactions - commits;

        batch.insert("transactions_total", transactions as f64);
        batch.insert("transactions_committed", commits as f64);
        batch.insert("transactions_rolled_back", rollbacks as f64);
        batch.insert(
            "transaction_success_rate",
            commits as f64 / transactions.max(1) as f64 * 100.0,
        );
        batch.insert("transaction_avg_time_ms", self.rng.gen_range(50.0..500.0));

        batch.insert("lock_waits", self.rng.gen_range(0..=10) as f64);
        let deadlocks = if chance(&mut self.rng, 0.1) {
            self.rng.gen_range(0..=2)
        } else {
            0
        };
        batch.insert("deadlocks", deadlocks as f64);
    }

    fn simulate_maintenance(&mut self, batch: &mut MetricBatch) {
        if chance(&mut self.rng, 0.1) {
            batch.insert("vacuum_operations", 1.0);
            batch.insert("vacuum_duration_ms", self.rng.gen_range(1000.0..10000.0));
        } else {
            batch.insert("vacuum_operations", 0.0);
        }

        batch.insert("index_scans", self.rng.gen_range(100..=1000) as f64);
        batch.insert("sequential_scans", self.rng.gen_range(10..=100) as f64);
        batch.insert("index_hit_ratio", self.rng.gen_range(85.0..99.0));
        batch.insert("buffer_cache_hit_ratio", self.rng.gen_range(90.0..99.5));
        batch.insert("shared_buffer_usage_mb", self.rng.gen_range(100.0..512.0));
    }

    fn simulate_error_conditions(&mut self, batch: &mut MetricBatch) {
        let query_errors = if chance(&mut self.rng, self.error_rate_variance) {
            let errors = self.rng.gen_range(1..=10);
            let error_type = ERROR_TYPES[self.rng.gen_range(0..ERROR_TYPES.len())];
            warn!(errors, error_type, "database query errors detected");
            errors
        } else {
            0
        };
        batch.insert("query_errors", query_errors as f64);

        let disk_usage = self.rng.gen_range(60.0..95.0);
        batch.insert("disk_usage_percentage", disk_usage);
        if disk_usage > 90.0 {
            warn!(disk_usage, "high database disk usage");
        }

        if chance(&mut self.rng, 0.3) {
            batch.insert("replication_lag_ms", self.rng.gen_range(0.0..1000.0));
        }
    }

    #[cfg(test)]
    fn active_connections(&self) -> u32 {
        self.active_connections
    }
}

impl Provider for DatabaseProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Database
    }

    fn produce(&mut self) -> Result<MetricBatch> {
        let mut batch = MetricBatch::new();
        self.simulate_query_performance(&mut batch);
        self.simulate_connection_management(&mut batch);
        self.simulate_transactions(&mut batch);
        self.simulate_maintenance(&mut batch);
        self.simulate_error_conditions(&mut batch);

        // Health: latency penalty plus one point per observed error, clamped.
        let avg_query_time = batch.get("average_query_time_ms").unwrap_or(50.0);
        let error_count = batch.get("query_errors").unwrap_or(0.0)
            + batch.get("connection_errors").unwrap_or(0.0);
        batch.insert(
            "database_health_score",
            clamp_score(100.0 - avg_query_time / LATENCY_PENALTY_DIVISOR - error_count),
        );

        Ok(batch)
    }
}
