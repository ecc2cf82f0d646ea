//! Frame budgets and render-cost bookkeeping for the painter.
//!
//! Nothing here touches the scene. The painter feeds timings and per-group
//! outcomes in, and reads back deadlines, medians and freeze decisions.

mod analytics;
mod counters;
mod deadline;
mod window;

pub use analytics::{
    AutoFreezePolicy, FreezeHeaviest, GraphPainterAnalytics, LogOnly, RenderPassSummary,
};
pub use counters::{RenderCounters, RenderMode};
pub use deadline::Deadline;
pub use window::RenderCostWindow;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_CAPACITY: usize = 11;
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);
const DEFAULT_SAMPLE_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Number of render durations kept for the running median.
    pub window_capacity: usize,
    pub target_frame_interval: Duration,
    /// Seed for choosing which sample to evict from a full window.
    pub sample_seed: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            target_frame_interval: DEFAULT_FRAME_INTERVAL,
            sample_seed: DEFAULT_SAMPLE_SEED,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), AnalyticsConfigError> {
        if self.window_capacity == 0 {
            return Err(AnalyticsConfigError::ZeroWindowCapacity);
        }
        if self.target_frame_interval.is_zero() {
            return Err(AnalyticsConfigError::ZeroFrameInterval);
        }
        Ok(())
    }

    /// Median render time above which a pass counts as over budget.
    pub fn budget(&self) -> Duration {
        self.target_frame_interval / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsConfigError {
    ZeroWindowCapacity,
    ZeroFrameInterval,
}

impl fmt::Display for AnalyticsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroWindowCapacity => write!(f, "render cost window capacity must be positive"),
            Self::ZeroFrameInterval => write!(f, "target frame interval must be positive"),
        }
    }
}

impl std::error::Error for AnalyticsConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_keeps_eleven_samples() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.window_capacity, 11);
        assert_eq!(config.budget(), Duration::from_millis(8));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_window() {
        let config = AnalyticsConfig {
            window_capacity: 0,
            ..AnalyticsConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(AnalyticsConfigError::ZeroWindowCapacity)
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults_when_deserialized() {
        let config: AnalyticsConfig =
            serde_json::from_str(r#"{"window_capacity": 5}"#).expect("decode analytics config");
        assert_eq!(config.window_capacity, 5);
        assert_eq!(config.target_frame_interval, DEFAULT_FRAME_INTERVAL);
    }
}
