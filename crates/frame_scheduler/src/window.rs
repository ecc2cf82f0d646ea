use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::AnalyticsConfig;

/// Fixed-capacity sample of recent render durations.
///
/// A full window evicts a uniformly random sample instead of the oldest one,
/// so a burst of slow frames cannot flush the whole history at once.
#[derive(Debug, Clone)]
pub struct RenderCostWindow {
    capacity: usize,
    samples: Vec<Duration>,
    rng: Pcg32,
}

impl RenderCostWindow {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self::with_capacity(config.window_capacity, config.sample_seed)
    }

    pub fn with_capacity(capacity: usize, seed: u64) -> Self {
        assert!(capacity > 0, "render cost window capacity must be positive");
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// Adds a sample and returns the one evicted to make room, if any.
    pub fn push(&mut self, sample: Duration) -> Option<Duration> {
        let evicted = if self.samples.len() >= self.capacity {
            let index = self.rng.random_range(0..self.samples.len());
            Some(self.samples.swap_remove(index))
        } else {
            None
        };
        self.samples.push(sample);
        evicted
    }

    /// Upper median: the element at `len / 2` of the sorted samples.
    pub fn median(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        Some(sorted[sorted.len() / 2])
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
