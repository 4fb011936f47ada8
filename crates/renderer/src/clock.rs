use std::time::{Duration, Instant};

/// Pause-aware elapsed time. Every reading takes an explicit `now`, so the
/// clock never consults the wall clock on its own.
#[derive(Debug, Clone)]
pub struct RenderClock {
    origin: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl RenderClock {
    pub fn new(now: Instant) -> Self {
        Self {
            origin: now,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let until = self.paused_at.unwrap_or(now);
        until
            .saturating_duration_since(self.origin)
            .saturating_sub(self.paused_total)
    }

    pub fn seconds(&self, now: Instant) -> f32 {
        self.elapsed(now).as_secs_f32()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }

    /// Moves the reference point to `now`. A paused clock stays paused at zero.
    pub fn reset(&mut self, now: Instant) {
        self.origin = now;
        self.paused_total = Duration::ZERO;
        if self.paused_at.is_some() {
            self.paused_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn paused_time_does_not_accumulate() {
        let start = Instant::now();
        let mut clock = RenderClock::new(start);
        clock.pause(start + secs(2));
        assert_eq!(clock.elapsed(start + secs(10)), secs(2));
        clock.resume(start + secs(10));
        assert_eq!(clock.elapsed(start + secs(11)), secs(3));
    }

    #[test]
    fn reset_zeroes_reference_only() {
        let start = Instant::now();
        let mut clock = RenderClock::new(start);
        clock.reset(start + secs(5));
        assert_eq!(clock.elapsed(start + secs(6)), secs(1));
        assert!(!clock.is_paused());
    }

    #[test]
    fn reset_while_paused_holds_zero() {
        let start = Instant::now();
        let mut clock = RenderClock::new(start);
        clock.pause(start + secs(3));
        clock.reset(start + secs(4));
        assert_eq!(clock.elapsed(start + secs(8)), Duration::ZERO);
        clock.resume(start + secs(8));
        assert_eq!(clock.elapsed(start + secs(9)), secs(1));
    }

    #[test]
    fn repeated_pause_keeps_first_instant() {
        let start = Instant::now();
        let mut clock = RenderClock::new(start);
        clock.pause(start + secs(1));
        clock.pause(start + secs(4));
        clock.resume(start + secs(5));
        assert_eq!(clock.elapsed(start + secs(5)), secs(1));
    }
}
