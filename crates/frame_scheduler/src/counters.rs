#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Cached,
    Immediate,
}

/// How paint groups were drawn: blitted from the freezer or rendered live.
///
/// Owned by whoever drives rendering and passed down by reference, so two
/// painters never share totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderCounters {
    cached_renders: u64,
    immediate_renders: u64,
    last_mode: Option<RenderMode>,
}

impl RenderCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, mode: RenderMode) {
        match mode {
            RenderMode::Cached => self.cached_renders += 1,
            RenderMode::Immediate => self.immediate_renders += 1,
        }
        if self.last_mode.is_some_and(|last| last != mode) {
            log::debug!(
                "[painter] switched to {:?} rendering ({} cached, {} immediate so far)",
                mode,
                self.cached_renders,
                self.immediate_renders
            );
        }
        self.last_mode = Some(mode);
    }

    pub fn cached_renders(&self) -> u64 {
        self.cached_renders
    }

    pub fn immediate_renders(&self) -> u64 {
        self.immediate_renders
    }

    pub fn last_mode(&self) -> Option<RenderMode> {
        self.last_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_mode_separately() {
        let mut counters = RenderCounters::new();
        counters.record(RenderMode::Immediate);
        counters.record(RenderMode::Immediate);
        counters.record(RenderMode::Cached);
        assert_eq!(counters.immediate_renders(), 2);
        assert_eq!(counters.cached_renders(), 1);
        assert_eq!(counters.last_mode(), Some(RenderMode::Cached));
    }
}
