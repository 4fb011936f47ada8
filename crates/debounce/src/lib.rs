use std::time::{Duration, Instant};

/// A restartable single-shot timer carrying the latest value pushed into it.
///
/// Every `push` replaces the pending value and moves the deadline to
/// `now + delay`; the value only comes out of [`Debouncer::poll`] once the
/// deadline passes with no further pushes. There is never more than one
/// pending deadline per debouncer.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    deadline: Instant,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replaces the pending value and restarts the window.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some(Pending {
            value,
            deadline: now + self.delay,
        });
    }

    /// Returns the settled value if the window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(pending) if now >= pending.deadline => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Drops the pending value without firing. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Fires the pending value now instead of at its deadline.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    #[test]
    fn fires_after_quiet_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.push("a", start);
        assert_eq!(debouncer.poll(start + Duration::from_millis(499)), None);
        assert_eq!(debouncer.poll(start + DELAY), Some("a"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + DELAY * 2), None);
    }

    #[test]
    fn push_restarts_instead_of_stacking() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.push(1, start);
        debouncer.push(2, start + Duration::from_millis(400));
        assert_eq!(debouncer.poll(start + DELAY), None);
        assert_eq!(
            debouncer.deadline(),
            Some(start + Duration::from_millis(900))
        );
        assert_eq!(debouncer.poll(start + Duration::from_millis(900)), Some(2));
        assert_eq!(debouncer.poll(start + Duration::from_secs(10)), None);
    }

    #[test]
    fn cancel_discards_pending_value() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.push("draft", start);
        assert!(debouncer.cancel());
        assert_eq!(debouncer.poll(start + DELAY), None);
        assert_eq!(debouncer.deadline(), None);
        assert!(!debouncer.cancel());
    }

    #[test]
    fn flush_fires_before_the_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(DELAY);
        debouncer.push("draft", start);
        assert_eq!(debouncer.flush(), Some("draft"));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + DELAY), None);
        assert_eq!(debouncer.flush(), None);
    }

    #[test]
    fn earliest_ignores_missing_deadlines() {
        let start = Instant::now();
        let later = start + DELAY;
        assert_eq!(earliest([None, Some(later), Some(start)]), Some(start));
        assert_eq!(earliest([None, None]), None);
    }
}
