//! Simulated server metrics

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;

use pulse_core::MetricSample;

/// Produces random cpu and memory readings.
///
/// Timestamps count whole seconds since the generator was created.
pub struct MetricsGenerator {
    rng: StdRng,
    started: Instant,
}

impl MetricsGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            started: Instant::now(),
        }
    }

    /// Create a generator with a specific seed (for testing)
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            started: Instant::now(),
        }
    }

    /// Next sample: cpu in [0, 100), memory in [1, 16)
    pub fn next_sample(&mut self) -> MetricSample {
        let elapsed = self.started.elapsed().as_secs();
        MetricSample {
            cpu: self.rng.gen_range(0.0..100.0),
            memory: self.rng.gen_range(1.0..16.0),
            timestamp: i64::try_from(elapsed).unwrap_or(i64::MAX),
        }
    }
}

impl Default for MetricsGenerator {
    fn default() -> Self {
        Self::new()
    }
}
