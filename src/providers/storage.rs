//! Object storage simulation: uploads, downloads, capacity, API traffic and
//! access patterns.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::{chance, Provider};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::metrics::{clamp_score, MetricBatch, ProviderKind};

/// Upload-failure odds = UPLOAD_FAILURE_SCALE * error_rate_variance
const UPLOAD_FAILURE_SCALE: f64 = 0.6;
/// API-error odds = API_ERROR_SCALE * error_rate_variance
const API_ERROR_SCALE: f64 = 2.0;
/// Unauthorized-access odds = UNAUTHORIZED_SCALE * error_rate_variance
const UNAUTHORIZED_SCALE: f64 = 1.6;
/// Health penalty per unauthorized access attempt
const UNAUTHORIZED_PENALTY: f64 = 10.0;

const CONTAINERS: [&str; 5] = ["app-data", "user-uploads", "backups", "logs", "images"];

struct FileType {
    name: &'static str,
    min_kb: f64,
    max_kb: f64,
    weight: f64,
}

const FILE_TYPES: [FileType; 5] = [
    FileType { name: "images", min_kb: 100.0, max_kb: 5000.0, weight: 0.4 },
    FileType { name: "documents", min_kb: 50.0, max_kb: 2000.0, weight: 0.25 },
    FileType { name: "videos", min_kb: 10000.0, max_kb: 100000.0, weight: 0.1 },
    FileType { name: "logs", min_kb: 1.0, max_kb: 100.0, weight: 0.15 },
    FileType { name: "backups", min_kb: 1000.0, max_kb: 50000.0, weight: 0.1 },
];

pub struct StorageProvider {
    rng: StdRng,
    file_type_weights: WeightedIndex<f64>,
    error_rate_variance: f64,
}

impl StorageProvider {
    pub fn new(config: &SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &SimulationConfig, rng: StdRng) -> Self {
        let file_type_weights = WeightedIndex::new(FILE_TYPES.iter().map(|f| f.weight))
            .expect("file type weight table is non-empty and positive");
        Self {
            rng,
            file_type_weights,
            error_rate_variance: config.error_rate_variance,
        }
    }

    fn simulate_uploads(&mut self, batch: &mut MetricBatch) {
        let total_uploads: u32 = self.rng.gen_range(10..=50);
        let mut total_size_kb = 0.0;
        let mut total_upload_time = 0.0;
        let mut failed_uploads = 0u32;

        let failure_odds = UPLOAD_FAILURE_SCALE * self.error_rate_variance;
        for _ in 0..total_uploads {
            let file_type = &FILE_TYPES[self.file_type_weights.sample(&mut self.rng)];
            let size_kb = self.rng.gen_range(file_type.min_kb..file_type.max_kb);
            total_size_kb += size_kb;

            // Base rate 1 MB/s, scaled by network conditions.
            let network_factor = self.rng.gen_range(0.5..2.0);
            let mut upload_time = size_kb / 1000.0 * network_factor;

            if chance(&mut self.rng, failure_odds) {
                failed_uploads += 1;
                upload_time *= 2.0;
                warn!(file_type = file_type.name, "blob upload failed");
            }
            total_upload_time += upload_time;
        }

        batch.insert("uploads_total", total_uploads as f64);
        batch.insert("uploads_failed", failed_uploads as f64);
        batch.insert(
            "upload_success_rate",
            (total_uploads - failed_uploads) as f64 / total_uploads.max(1) as f64 * 100.0,
        );
        batch.insert("total_upload_size_kb", total_size_kb);
        batch.insert(
            "average_upload_time_seconds",
            total_upload_time / total_uploads.max(1) as f64,
        );
        batch.insert(
            "upload_throughput_kbps",
            total_size_kb / total_upload_time.max(0.1),
        );
    }

    fn simulate_downloads(&mut self, batch: &mut MetricBatch) {
        let total_downloads: u32 = self.rng.gen_range(20..=100);
        let mut total_size_kb = 0.0;
        let mut total_download_time = 0.0;
        let mut cache_hits = 0u32;

        for _ in 0..total_downloads {
            let size_kb = self.rng.gen_range(50.0..5000.0);
            total_size_kb += size_kb;

            let download_time = if chance(&mut self.rng, 0.4) {
                cache_hits += 1;
                self.rng.gen_range(0.1..0.5)
            } else {
                // Origin fetch at a 2 MB/s base rate
                size_kb / 2000.0 * self.rng.gen_range(0.8..1.5)
            };
            total_download_time += download_time;
        }

        batch.insert("downloads_total", total_downloads as f64);
        batch.insert("download_cache_hits", cache_hits as f64);
        batch.insert(
            "download_cache_hit_rate",
            cache_hits as f64 / total_downloads.max(1) as f64 * 100.0,
        );
        batch.insert("total_download_size_kb", total_size_kb);
        batch.insert(
            "average_download_time_seconds",
            total_download_time / total_downloads.max(1) as f64,
        );
        batch.insert(
            "download_throughput_kbps",
            total_size_kb / total_download_time.max(0.1),
        );
    }

    fn simulate_capacity(&mut self, batch: &mut MetricBatch) {
        let mut total_storage_gb = 0.0;
        for container in CONTAINERS {
            let container_gb = self.rng.gen_range(10.0..500.0);
            total_storage_gb += container_gb;
            batch.insert(format!("{container}_storage_gb"), container_gb);
        }
        batch.insert("total_storage_gb", total_storage_gb);
        batch.insert("storage_cost_estimate_usd", total_storage_gb * 0.02);
        batch.insert(
            "total_blob_count",
            self.rng.gen_range(10000..=100000) as f64,
        );

        let hot = self.rng.gen_range(20.0..40.0);
        let cool = self.rng.gen_range(30.0..50.0);
        batch.insert("hot_tier_percentage", hot);
        batch.insert("cool_tier_percentage", cool);
        batch.insert("archive_tier_percentage", 100.0 - hot - cool);
    }

    fn simulate_api_traffic(&mut self, batch: &mut MetricBatch) {
        let operations: [(&str, u32); 5] = [
            ("list_blobs", self.rng.gen_range(50..=200)),
            ("get_blob_properties", self.rng.gen_range(100..=500)),
            ("put_blob", self.rng.gen_range(20..=100)),
            ("delete_blob", self.rng.gen_range(5..=30)),
            ("copy_blob", self.rng.gen_range(1..=10)),
        ];

        let total_calls: u32 = operations.iter().map(|(_, count)| count).sum();
        batch.insert("total_api_calls", total_calls as f64);
        for (operation, count) in operations {
            batch.insert(format!("{operation}_count"), count as f64);
        }
        batch.insert("api_average_response_ms", self.rng.gen_range(50.0..300.0));

        let api_errors = if chance(&mut self.rng, API_ERROR_SCALE * self.error_rate_variance) {
            self.rng.gen_range(0..=5)
        } else {
            0
        };
        batch.insert("api_errors", api_errors as f64);
        batch.insert(
            "api_error_rate",
            api_errors as f64 / total_calls.max(1) as f64 * 100.0,
        );

        let throttling_events = if chance(&mut self.rng, self.error_rate_variance) {
            self.rng.gen_range(0..=2)
        } else {
            0
        };
        batch.insert("throttling_events", throttling_events as f64);
        if throttling_events > 0 {
            warn!(throttling_events, "storage API throttling detected");
        }
    }

    fn simulate_access_patterns(&mut self, batch: &mut MetricBatch) {
        let anonymous: u32 = self.rng.gen_range(0..=10);
        let authenticated: u32 = self.rng.gen_range(100..=1000);
        batch.insert("anonymous_requests", anonymous as f64);
        batch.insert("authenticated_requests", authenticated as f64);
        batch.insert("total_requests", (anonymous + authenticated) as f64);

        let unauthorized = if chance(&mut self.rng, UNAUTHORIZED_SCALE * self.error_rate_variance)
        {
            self.rng.gen_range(0..=3)
        } else {
            0
        };
        batch.insert("unauthorized_access_attempts", unauthorized as f64);
        if unauthorized > 0 {
            warn!(attempts = unauthorized, "unauthorized storage access attempts");
        }

        batch.insert("sas_token_requests", self.rng.gen_range(20..=100) as f64);
    }
}

impl Provider for StorageProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Storage
    }

    fn produce(&mut self) -> Result<MetricBatch> {
        let mut batch = MetricBatch::new();
        self.simulate_uploads(&mut batch);
        self.simulate_downloads(&mut batch);
        self.simulate_capacity(&mut batch);
        self.simulate_api_traffic(&mut batch);
        self.simulate_access_patterns(&mut batch);

        // Mean of three normalized sub-scores, clamped.
        let upload_success = batch.get("upload_success_rate").unwrap_or(100.0);
        let api_success = 100.0 - batch.get("api_error_rate").unwrap_or(0.0);
        let security_score = 100.0
            - batch.get("unauthorized_access_attempts").unwrap_or(0.0) * UNAUTHORIZED_PENALTY;
        batch.insert(
            "storage_performance_score",
            clamp_score((upload_success + api_success + security_score) / 3.0),
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(seed: u64) -> StorageProvider {
        StorageProvider::with_rng(&SimulationConfig::default(), StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_batch_is_finite_with_bounded_rates() {
        let mut p = provider(1);
        for _ in 0..20 {
            let batch = p.produce().unwrap();
            for (name, value) in batch.iter() {
                assert!(value.is_finite(), "{name} produced non-finite value");
            }
            for key in [
                "upload_success_rate",
                "download_cache_hit_rate",
                "api_error_rate",
                "storage_performance_score",
            ] {
                let value = batch.get(key).unwrap();
                assert!((0.0..=100.0).contains(&value), "{key} out of range: {value}");
            }
        }
    }

    #[test]
    fn test_tier_percentages_sum_to_one_hundred() {
        let mut p = provider(2);
        let batch = p.produce().unwrap();
        let sum = batch.get("hot_tier_percentage").unwrap()
            + batch.get("cool_tier_percentage").unwrap()
            + batch.get("archive_tier_percentage").unwrap();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_first_batch() {
        let mut a = provider(42);
        let mut b = provider(42);
        assert_eq!(a.produce().unwrap(), b.produce().unwrap());
    }
}
