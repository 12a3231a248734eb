//! Cycle orchestration and scheduling.
//!
//! `TelemetryWorker` drives one cycle at a time: every provider runs
//! sequentially in a fixed order, each isolated so one failure cannot starve
//! the rest, then the cycle's batches are exported and logged. The run loop
//! repeats forever on a jittered cadence until stopped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::export::{EventLog, Exporter};
use crate::metrics::CycleEvent;
use crate::providers::Provider;

/// Inter-cycle sleep varies by up to ±10% of the base interval
const JITTER_FRACTION: f64 = 0.1;
/// Jitter never pushes the sleep below one second
const MIN_SLEEP: Duration = Duration::from_secs(1);
/// Fixed backoff after an error escaping the cycle guard
const FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Outcome of one completed cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleSummary {
    pub duration: Duration,
    pub metrics_collected: usize,
    pub provider_failures: usize,
}

/// External control surface for a running worker. Safe to call from any
/// task; `stop` guarantees no new cycle starts after it returns, though an
/// in-flight cycle still completes.
#[derive(Clone)]
pub struct WorkerHandle {
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
}

impl WorkerHandle {
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("telemetry worker stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }
}

pub struct TelemetryWorker {
    providers: Vec<Box<dyn Provider>>,
    exporter: Arc<dyn Exporter>,
    event_log: Arc<dyn EventLog>,
    service_name: String,
    base_interval: Duration,
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    jitter_rng: StdRng,
}

impl TelemetryWorker {
    pub fn new(
        providers: Vec<Box<dyn Provider>>,
        exporter: Arc<dyn Exporter>,
        event_log: Arc<dyn EventLog>,
        service_name: String,
        base_interval: Duration,
    ) -> Self {
        Self {
            providers,
            exporter,
            event_log,
            service_name,
            base_interval,
            running: Arc::new(AtomicBool::new(true)),
            cycles: Arc::new(AtomicU64::new(0)),
            jitter_rng: StdRng::from_entropy(),
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            running: Arc::clone(&self.running),
            cycles: Arc::clone(&self.cycles),
        }
    }

    /// Run one complete telemetry cycle.
    ///
    /// Provider failures are isolated here: each failing provider yields one
    /// TelemetryError export event while the remaining providers still run.
    /// The returned `Err` path exists only as the scheduler's defensive
    /// second layer.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        let started = Instant::now();
        let mut data = BTreeMap::new();
        let mut metrics_collected = 0usize;
        let mut provider_failures = 0usize;

        for provider in &mut self.providers {
            let kind = provider.kind();
            match provider.produce() {
                Ok(batch) => {
                    for (name, value) in batch.iter() {
                        let metric = format!("{}.{}", kind.metric_prefix(), name);
                        self.exporter.record_metric(&metric, *value).await;
                    }
                    metrics_collected += batch.len();
                    data.insert(kind.event_key(), batch);
                }
                Err(e) => {
                    provider_failures += 1;
                    error!(provider = %kind, error = %e, "provider failed during cycle");
                    self.exporter
                        .record_event(
                            "TelemetryError",
                            json!({
                                "error_type": e.kind(),
                                "error_message": e.to_string(),
                            }),
                        )
                        .await;
                }
            }
        }

        self.event_log
            .emit(&CycleEvent::new(self.service_name.clone(), data));

        let duration = started.elapsed();
        self.exporter
            .record_event(
                "TelemetryCycle",
                json!({
                    "duration_ms": duration.as_secs_f64() * 1000.0,
                    "metrics_collected": metrics_collected,
                }),
            )
            .await;

        info!(
            duration_ms = duration.as_millis() as u64,
            metrics_collected, provider_failures, "telemetry cycle completed"
        );

        Ok(CycleSummary {
            duration,
            metrics_collected,
            provider_failures,
        })
    }

    /// Main run loop: cycles forever on a jittered cadence until the handle
    /// requests a stop. Nothing short of that stops the loop; an error that
    /// escapes the cycle guard is logged and followed by a fixed backoff.
    pub async fn run(&mut self) {
        info!(
            interval_secs = self.base_interval.as_secs(),
            providers = self.providers.len(),
            "telemetry worker started"
        );

        while self.running.load(Ordering::SeqCst) {
            let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(cycle, "starting telemetry cycle");

            let outcome = self.run_cycle().await;
            if let Err(e) = &outcome {
                error!(error = %e, "unexpected error in worker loop");
            }
            let sleep = next_sleep(&outcome, self.base_interval, &mut self.jitter_rng);
            tokio::time::sleep(sleep).await;
        }

        info!(
            cycles = self.cycles.load(Ordering::SeqCst),
            "telemetry worker stopped"
        );
    }
}

/// After a clean cycle the loop sleeps the jittered interval; after an error
/// escaping the cycle guard it sleeps the fixed backoff instead.
fn next_sleep(outcome: &Result<CycleSummary>, base: Duration, rng: &mut StdRng) -> Duration {
    match outcome {
        Ok(_) => jittered_interval(base, rng),
        Err(_) => FAILURE_BACKOFF,
    }
}

/// Base interval ± up to 10%, floored at one second.
fn jittered_interval(base: Duration, rng: &mut StdRng) -> Duration {
    let jitter = rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let jittered = Duration::from_secs_f64(base.as_secs_f64() * (1.0 + jitter));
    jittered.max(MIN_SLEEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_within_ten_percent() {
        let mut rng = StdRng::seed_from_u64(1);
        let base = Duration::from_secs(30);
        for _ in 0..1000 {
            let sleep = jittered_interval(base, &mut rng);
            assert!(sleep >= Duration::from_secs(27), "too short: {sleep:?}");
            assert!(sleep <= Duration::from_secs(33), "too long: {sleep:?}");
        }
    }

    #[test]
    fn test_failed_cycle_sleeps_the_fixed_backoff() {
        let mut rng = StdRng::seed_from_u64(3);
        let base = Duration::from_secs(30);

        let failed: Result<CycleSummary> =
            Err(crate::error::TelesimError::Internal("boom".to_string()));
        assert_eq!(next_sleep(&failed, base, &mut rng), FAILURE_BACKOFF);

        let clean: Result<CycleSummary> = Ok(CycleSummary {
            duration: Duration::from_millis(5),
            metrics_collected: 10,
            provider_failures: 0,
        });
        let sleep = next_sleep(&clean, base, &mut rng);
        assert!(sleep >= Duration::from_secs(27) && sleep <= Duration::from_secs(33));
    }

    #[test]
    fn test_jitter_never_drops_below_one_second() {
        let mut rng = StdRng::seed_from_u64(2);
        let base = Duration::from_secs(1);
        for _ in 0..1000 {
            let sleep = jittered_interval(base, &mut rng);
            assert!(sleep >= Duration::from_secs(1));
        }
    }
}
