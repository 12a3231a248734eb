//! Network fabric simulation: endpoint latency, throughput, connectivity
//! failures, load balancing and CDN behaviour.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::{chance, uniform, Provider};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::metrics::{clamp_score, MetricBatch, ProviderKind};

const BASELINE_LATENCY_MS: f64 = 15.0;
const LATENCY_STD_DEV_MS: f64 = 5.0;
/// Spike factor range = [15, 50] * performance_variance
const SPIKE_FACTOR_LO_SCALE: f64 = 15.0;
const SPIKE_FACTOR_HI_SCALE: f64 = 50.0;
/// Timeout/DNS/refused odds relative to error_rate_variance
const TIMEOUT_SCALE: f64 = 0.4;
const DNS_FAILURE_SCALE: f64 = 0.2;
const REFUSED_SCALE: f64 = 0.3;
const SSL_ERROR_SCALE: f64 = 0.1;
/// Health penalty weights
const LATENCY_PENALTY_DIVISOR: f64 = 2.0;
const PACKET_LOSS_PENALTY: f64 = 1000.0;
const CONNECTION_ERROR_PENALTY: f64 = 20.0;

/// (endpoint, metric-safe name)
const ENDPOINTS: [(&str, &str); 5] = [
    ("api.service.local", "api_service_local"),
    ("database.internal", "database_internal"),
    ("cache.redis.local", "cache_redis_local"),
    ("storage.blob.azure.com", "storage_blob_azure_com"),
    ("monitoring.newrelic.com", "monitoring_newrelic_com"),
];

pub struct NetworkProvider {
    rng: StdRng,
    error_rate_variance: f64,
    performance_variance: f64,
}

impl NetworkProvider {
    pub fn new(config: &SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &SimulationConfig, rng: StdRng) -> Self {
        Self {
            rng,
            error_rate_variance: config.error_rate_variance,
            performance_variance: config.performance_variance,
        }
    }

    /// Box-Muller transform; `rand` itself only ships uniform sampling.
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen::<f64>();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    fn simulate_latency(&mut self, batch: &mut MetricBatch) {
        let mut total_measurements = 0u32;
        let mut total_latency = 0.0;
        let mut spikes = 0u32;

        let spike_lo = SPIKE_FACTOR_LO_SCALE * self.performance_variance;
        let spike_hi = SPIKE_FACTOR_HI_SCALE * self.performance_variance;

        for (endpoint, key) in ENDPOINTS {
            let measurements: u32 = self.rng.gen_range(10..=30);
            let mut sum = 0.0;
            let mut min = f64::MAX;
            let mut max = f64::MIN;

            for _ in 0..measurements {
                let mut latency = self.gaussian(BASELINE_LATENCY_MS, LATENCY_STD_DEV_MS);
                if chance(&mut self.rng, self.error_rate_variance) {
                    latency *= uniform(&mut self.rng, spike_lo, spike_hi);
                    spikes += 1;
                    warn!(endpoint, latency_ms = latency, "high latency detected");
                }
                let latency = latency.max(1.0);
                sum += latency;
                min = min.min(latency);
                max = max.max(latency);
                total_latency += latency;
                total_measurements += 1;
            }

            batch.insert(format!("{key}_avg_latency_ms"), sum / measurements as f64);
            batch.insert(format!("{key}_max_latency_ms"), max);
            batch.insert(format!("{key}_min_latency_ms"), min);
        }

        batch.insert(
            "overall_avg_latency_ms",
            total_latency / total_measurements.max(1) as f64,
        );
        batch.insert("high_latency_events", spikes as f64);
        batch.insert(
            "latency_spike_rate",
            spikes as f64 / total_measurements.max(1) as f64 * 100.0,
        );
    }

    fn simulate_throughput(&mut self, batch: &mut MetricBatch) {
        let baseline_bandwidth_mbps = 1000.0;
        let utilization = self.rng.gen_range(20.0..80.0);
        batch.insert("bandwidth_utilization_percent", utilization);
        batch.insert(
            "available_bandwidth_mbps",
            baseline_bandwidth_mbps * (100.0 - utilization) / 100.0,
        );

        let ingress = self.rng.gen_range(50.0..300.0);
        let egress = self.rng.gen_range(100.0..500.0);
        batch.insert("ingress_traffic_mbps", ingress);
        batch.insert("egress_traffic_mbps", egress);
        batch.insert("total_traffic_mbps", ingress + egress);

        let packets_sent: u32 = self.rng.gen_range(10000..=100000);
        let loss_rate = self.rng.gen_range(0.001..0.1);
        batch.insert("packets_sent", packets_sent as f64);
        batch.insert(
            "packets_lost",
            (packets_sent as f64 * loss_rate / 100.0).floor(),
        );
        batch.insert("packet_loss_rate", loss_rate);
        if loss_rate > 0.05 {
            warn!(loss_rate, "high packet loss rate");
        }
    }

    fn simulate_connectivity(&mut self, batch: &mut MetricBatch) {
        let timeouts = if chance(&mut self.rng, TIMEOUT_SCALE * self.error_rate_variance) {
            let events = self.rng.gen_range(1..=3);
            warn!(events, "network timeout events");
            events
        } else {
            0
        };
        let dns_failures = if chance(&mut self.rng, DNS_FAILURE_SCALE * self.error_rate_variance) {
            let events = self.rng.gen_range(1..=2);
            warn!(events, "DNS resolution failures");
            events
        } else {
            0
        };
        let refused = if chance(&mut self.rng, REFUSED_SCALE * self.error_rate_variance) {
            let events = self.rng.gen_range(1..=2);
            warn!(events, "connection refused events");
            events
        } else {
            0
        };

        batch.insert("timeout_events", timeouts as f64);
        batch.insert("dns_failures", dns_failures as f64);
        batch.insert("connection_refused", refused as f64);
        batch.insert(
            "total_connection_errors",
            (timeouts + dns_failures + refused) as f64,
        );

        batch.insert("ssl_handshake_time_ms", self.rng.gen_range(50.0..200.0));
        let ssl_errors = if chance(&mut self.rng, SSL_ERROR_SCALE * self.error_rate_variance) {
            self.rng.gen_range(0..=1)
        } else {
            0
        };
        batch.insert("ssl_errors", ssl_errors as f64);
    }

    fn simulate_load_balancer(&mut self, batch: &mut MetricBatch) {
        let total_backends: u32 = self.rng.gen_range(3..=8);
        let healthy_backends = total_backends - self.rng.gen_range(0..=1);

        batch.insert("total_backend_servers", total_backends as f64);
        batch.insert("healthy_backend_servers", healthy_backends as f64);
        batch.insert(
            "backend_health_percentage",
            healthy_backends as f64 / total_backends as f64 * 100.0,
        );

        let mut total_requests = 0u32;
        let mut min_requests = u32::MAX;
        let mut max_requests = 0u32;
        for _ in 0..healthy_backends {
            let requests: u32 = self.rng.gen_range(50..=200);
            total_requests += requests;
            min_requests = min_requests.min(requests);
            max_requests = max_requests.max(requests);
        }

        if healthy_backends > 0 {
            batch.insert("total_requests", total_requests as f64);
            batch.insert(
                "avg_requests_per_backend",
                total_requests as f64 / healthy_backends as f64,
            );
            batch.insert(
                "load_balance_variance",
                (max_requests - min_requests) as f64,
            );
        } else {
            batch.insert("total_requests", 0.0);
            batch.insert("avg_requests_per_backend", 0.0);
            batch.insert("load_balance_variance", 0.0);
        }

        batch.insert(
            "load_balancer_response_time_ms",
            self.rng.gen_range(1.0..10.0),
        );
    }

    fn simulate_cdn(&mut self, batch: &mut MetricBatch) {
        let total_requests: u32 = self.rng.gen_range(1000..=5000);
        let cache_hits = (total_requests as f64 * self.rng.gen_range(0.70..0.85)) as u32;
        let cache_misses = total_requests - cache_hits;

        batch.insert("cdn_total_requests", total_requests as f64);
        batch.insert("cdn_cache_hits", cache_hits as f64);
        batch.insert("cdn_cache_misses", cache_misses as f64);
        batch.insert(
            "cdn_hit_rate",
            cache_hits as f64 / total_requests.max(1) as f64 * 100.0,
        );
        batch.insert("cdn_cache_hit_time_ms", self.rng.gen_range(5.0..20.0));
        batch.insert("cdn_cache_miss_time_ms", self.rng.gen_range(50.0..200.0));

        let origin_bandwidth_gb = self.rng.gen_range(10.0..50.0);
        let cdn_bandwidth_gb =
            origin_bandwidth_gb * cache_misses as f64 / total_requests.max(1) as f64;
        let saved_gb = origin_bandwidth_gb - cdn_bandwidth_gb;
        batch.insert("origin_bandwidth_gb", origin_bandwidth_gb);
        batch.insert("cdn_bandwidth_gb", cdn_bandwidth_gb);
        batch.insert("bandwidth_saved_gb", saved_gb);
        batch.insert(
            "bandwidth_savings_percent",
            saved_gb / origin_bandwidth_gb * 100.0,
        );
    }
}

impl Provider for NetworkProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Network
    }

    fn produce(&mut self) -> Result<MetricBatch> {
        let mut batch = MetricBatch::new();
        self.simulate_latency(&mut batch);
        self.simulate_throughput(&mut batch);
        self.simulate_connectivity(&mut batch);
        self.simulate_load_balancer(&mut batch);
        self.simulate_cdn(&mut batch);

        // Mean of latency/packet-loss/connectivity sub-scores, clamped.
        let latency_score =
            100.0 - batch.get("overall_avg_latency_ms").unwrap_or(0.0) / LATENCY_PENALTY_DIVISOR;
        let packet_score =
            100.0 - batch.get("packet_loss_rate").unwrap_or(0.0) * PACKET_LOSS_PENALTY;
        let connectivity_score = 100.0
            - batch.get("total_connection_errors").unwrap_or(0.0) * CONNECTION_ERROR_PENALTY;
        batch.insert(
            "network_health_score",
            clamp_score(
                (clamp_score(latency_score) + clamp_score(packet_score)
                    + clamp_score(connectivity_score))
                    / 3.0,
            ),
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(seed: u64) -> NetworkProvider {
        NetworkProvider::with_rng(&SimulationConfig::default(), StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_batch_is_finite_with_positive_latency() {
        let mut p = provider(1);
        for _ in 0..20 {
            let batch = p.produce().unwrap();
            for (name, value) in batch.iter() {
                assert!(value.is_finite(), "{name} produced non-finite value");
            }
            for (_, key) in ENDPOINTS {
                let min = batch.get(&format!("{key}_min_latency_ms")).unwrap();
                assert!(min >= 1.0, "latency below 1ms floor: {min}");
            }
            let score = batch.get("network_health_score").unwrap();
            assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn test_zero_variance_disables_spikes() {
        let config = SimulationConfig {
            error_rate_variance: 0.0,
            performance_variance: 0.0,
            ..SimulationConfig::default()
        };
        let mut p = NetworkProvider::with_rng(&config, StdRng::seed_from_u64(9));
        let batch = p.produce().unwrap();
        assert_eq!(batch.get("high_latency_events"), Some(0.0));
    }

    #[test]
    fn test_same_seed_same_first_batch() {
        let mut a = provider(42);
        let mut b = provider(42);
        assert_eq!(a.produce().unwrap(), b.produce().unwrap());
    }
}
