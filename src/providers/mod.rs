//! Metric providers, one per simulated subsystem domain.
//!
//! Each provider independently produces one cycle's worth of metrics from
//! its own state and its own random stream. Providers run sequentially in a
//! fixed order and never share state.

mod cluster;
mod database;
mod host;
mod network;
mod storage;

pub use cluster::ClusterProvider;
pub use database::DatabaseProvider;
pub use host::HostProvider;
pub use network::NetworkProvider;
pub use storage::StorageProvider;

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::Result;
use crate::metrics::{MetricBatch, ProviderKind};

/// Capability interface for one cycle's worth of metric production.
///
/// The built-in providers are infallible in practice; the `Result` is the
/// isolation seam the orchestrator uses to keep one misbehaving provider
/// from taking down the rest of the cycle.
pub trait Provider: Send {
    fn kind(&self) -> ProviderKind;

    fn produce(&mut self) -> Result<MetricBatch>;
}

/// Uniform sample that tolerates a degenerate range (`hi <= lo` yields `lo`).
/// Escalation ranges scaled by variance tuning can collapse to zero width.
pub(crate) fn uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// Probability sample that tolerates values outside [0, 1].
pub(crate) fn chance(rng: &mut StdRng, p: f64) -> bool {
    rng.gen_bool(p.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_degenerate_range() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(uniform(&mut rng, 5.0, 5.0), 5.0);
        assert_eq!(uniform(&mut rng, 5.0, 2.0), 5.0);

        let v = uniform(&mut rng, 1.0, 2.0);
        assert!((1.0..2.0).contains(&v));
    }

    #[test]
    fn test_chance_clamps_probability() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(chance(&mut rng, 1.7));
        assert!(!chance(&mut rng, -0.5));
    }
}
