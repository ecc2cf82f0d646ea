use std::time::{Duration, Instant};

/// Time budget for one cooperative slice of work.
///
/// A `None` timeout never expires. A zero timeout is already past when the
/// first yield point checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::starting_at(Instant::now(), timeout)
    }

    pub fn starting_at(start: Instant, timeout: Option<Duration>) -> Self {
        Self { start, timeout }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_past(&self) -> bool {
        self.is_past_at(Instant::now())
    }

    pub fn is_past_at(&self, now: Instant) -> bool {
        let Some(timeout) = self.timeout else {
            return false;
        };
        now.saturating_duration_since(self.start) >= timeout
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.timeout
            .map(|timeout| timeout.saturating_sub(now.saturating_duration_since(self.start)))
    }

    /// Even share of the remaining budget for one of `parts` callees.
    pub fn share(&self, parts: usize) -> Option<Duration> {
        assert!(parts > 0, "cannot share a deadline between zero parts");
        let parts = u32::try_from(parts).unwrap_or(u32::MAX);
        self.remaining().map(|remaining| remaining / parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_is_immediately_past() {
        let start = Instant::now();
        let deadline = Deadline::starting_at(start, Some(Duration::ZERO));
        assert!(deadline.is_past_at(start));
        assert_eq!(deadline.remaining_at(start), Some(Duration::ZERO));
    }

    #[test]
    fn unbounded_deadline_never_expires() {
        let start = Instant::now();
        let deadline = Deadline::starting_at(start, None);
        assert!(!deadline.is_past_at(start + Duration::from_secs(3600)));
        assert_eq!(deadline.remaining_at(start), None);
        assert_eq!(deadline.share(4), None);
    }

    #[test]
    fn bounded_deadline_expires_after_timeout() {
        let start = Instant::now();
        let deadline = Deadline::starting_at(start, Some(Duration::from_millis(10)));
        assert!(!deadline.is_past_at(start + Duration::from_millis(9)));
        assert!(deadline.is_past_at(start + Duration::from_millis(10)));
        assert_eq!(
            deadline.remaining_at(start + Duration::from_millis(4)),
            Some(Duration::from_millis(6))
        );
    }
}
