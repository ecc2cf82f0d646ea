use std::time::{Duration, Instant};

use crate::window::RenderCostWindow;

/// Counters for a single render pass over every paint group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphPainterAnalytics {
    start: Instant,
    dirty_renders: u32,
    groups_rendered: u32,
    most_renders: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassSummary {
    pub duration: Duration,
    pub dirty_renders: u32,
    pub groups_rendered: u32,
    /// Highest consecutive clean render count of any group in the pass.
    pub most_renders: u32,
    /// Whether `duration` was added to the render cost window.
    pub sampled: bool,
    pub median: Option<Duration>,
    pub over_budget: bool,
}

impl GraphPainterAnalytics {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            dirty_renders: 0,
            groups_rendered: 0,
            most_renders: 0,
        }
    }

    pub fn record_start(&mut self, start: Instant) {
        *self = Self::new(start);
    }

    pub fn record_dirty_render(&mut self) {
        self.dirty_renders += 1;
        self.groups_rendered += 1;
    }

    pub fn record_consecutive_render(&mut self) {
        self.groups_rendered += 1;
    }

    pub fn record_num_renders(&mut self, num_renders: u32) {
        self.most_renders = self.most_renders.max(num_renders);
    }

    pub fn dirty_renders(&self) -> u32 {
        self.dirty_renders
    }

    pub fn groups_rendered(&self) -> u32 {
        self.groups_rendered
    }

    pub fn most_renders(&self) -> u32 {
        self.most_renders
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_renders > 0
    }

    /// Closes the pass. Its duration only enters `window` when some group
    /// rendered clean more than once, so the median tracks stable frames.
    pub fn record_completion(
        &self,
        end: Instant,
        window: &mut RenderCostWindow,
        budget: Duration,
    ) -> RenderPassSummary {
        let duration = end.saturating_duration_since(self.start);
        let sampled = self.most_renders > 1;
        let mut median = None;
        let mut over_budget = false;
        if sampled {
            window.push(duration);
            median = window.median();
            over_budget = median.is_some_and(|median| median > budget);
        }
        if self.dirty_renders > 0 {
            log::trace!(
                "[analytics] {} paint groups rendered ({} dirty) in {:?}",
                self.groups_rendered,
                self.dirty_renders,
                duration
            );
        }
        RenderPassSummary {
            duration,
            dirty_renders: self.dirty_renders,
            groups_rendered: self.groups_rendered,
            most_renders: self.most_renders,
            sampled,
            median,
            over_budget,
        }
    }
}

/// Decides what happens once the median render time crosses the budget.
///
/// Returning `true` asks the painter to freeze the paint group that
/// rendered clean the most times during the pass.
pub trait AutoFreezePolicy {
    fn should_freeze(&mut self, summary: &RenderPassSummary) -> bool;
}

impl<F> AutoFreezePolicy for F
where
    F: FnMut(&RenderPassSummary) -> bool,
{
    fn should_freeze(&mut self, summary: &RenderPassSummary) -> bool {
        self(summary)
    }
}

/// Reports over-budget passes and never freezes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnly;

impl AutoFreezePolicy for LogOnly {
    fn should_freeze(&mut self, summary: &RenderPassSummary) -> bool {
        log::debug!(
            "[analytics] median render time {:?} is over budget (most renders = {})",
            summary.median,
            summary.most_renders
        );
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FreezeHeaviest;

impl AutoFreezePolicy for FreezeHeaviest {
    fn should_freeze(&mut self, summary: &RenderPassSummary) -> bool {
        log::debug!(
            "[analytics] freezing heaviest paint group, median render time {:?}",
            summary.median
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: Duration = Duration::from_millis(8);

    #[test]
    fn dirty_render_counts_as_rendered_group() {
        let mut analytics = GraphPainterAnalytics::new(Instant::now());
        analytics.record_dirty_render();
        analytics.record_consecutive_render();
        assert!(analytics.is_dirty());
        assert_eq!(analytics.dirty_renders(), 1);
        assert_eq!(analytics.groups_rendered(), 2);
    }

    #[test]
    fn pass_without_repeated_renders_is_not_sampled() {
        let start = Instant::now();
        let mut window = RenderCostWindow::with_capacity(11, 1);
        let mut analytics = GraphPainterAnalytics::new(start);
        analytics.record_num_renders(1);

        let summary =
            analytics.record_completion(start + Duration::from_millis(30), &mut window, BUDGET);

        assert!(!summary.sampled);
        assert!(!summary.over_budget);
        assert!(window.is_empty());
    }

    #[test]
    fn slow_stable_passes_cross_budget() {
        let start = Instant::now();
        let mut window = RenderCostWindow::with_capacity(11, 1);
        let mut analytics = GraphPainterAnalytics::new(start);
        analytics.record_consecutive_render();
        analytics.record_num_renders(3);

        let summary =
            analytics.record_completion(start + Duration::from_millis(12), &mut window, BUDGET);

        assert!(summary.sampled);
        assert_eq!(summary.median, Some(Duration::from_millis(12)));
        assert!(summary.over_budget);
    }

    #[test]
    fn fast_stable_passes_stay_under_budget() {
        let start = Instant::now();
        let mut window = RenderCostWindow::with_capacity(11, 1);
        let mut analytics = GraphPainterAnalytics::new(start);
        analytics.record_num_renders(2);

        let summary =
            analytics.record_completion(start + Duration::from_millis(2), &mut window, BUDGET);

        assert!(summary.sampled);
        assert!(!summary.over_budget);
    }

    #[test]
    fn record_start_resets_counters() {
        let mut analytics = GraphPainterAnalytics::new(Instant::now());
        analytics.record_dirty_render();
        analytics.record_num_renders(4);
        analytics.record_start(Instant::now());
        assert!(!analytics.is_dirty());
        assert_eq!(analytics.most_renders(), 0);
    }

    #[test]
    fn closures_act_as_freeze_policies() {
        let mut calls = 0;
        let mut policy = |summary: &RenderPassSummary| {
            calls += 1;
            summary.most_renders > 5
        };
        let summary = RenderPassSummary {
            duration: Duration::from_millis(20),
            dirty_renders: 0,
            groups_rendered: 1,
            most_renders: 6,
            sampled: true,
            median: Some(Duration::from_millis(20)),
            over_budget: true,
        };
        assert!(policy.should_freeze(&summary));
        assert!(!LogOnly.should_freeze(&summary));
        assert_eq!(calls, 1);
    }
}
