use std::time::{Duration, Instant};

/// Token for one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The host's frame-pacing primitive.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler backing the window host. A requested frame stays armed until the
/// host takes it; with an fps cap, taking waits until the interval since the
/// previous frame has passed.
#[derive(Debug, Clone, Default)]
pub struct PacedScheduler {
    next_id: u64,
    armed: Option<FrameHandle>,
    interval: Option<Duration>,
    last_frame: Option<Instant>,
    idle_until: Option<Instant>,
}

impl PacedScheduler {
    pub fn new(fps: Option<f32>) -> Self {
        let interval = fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.armed.is_some() && self.due_at().map_or(true, |due| now >= due)
    }

    /// When an armed, throttled frame becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.armed?;
        self.due_at()
    }

    /// Hands out the armed frame if it is due.
    pub fn take(&mut self, now: Instant) -> Option<FrameHandle> {
        if !self.ready(now) {
            return None;
        }
        self.last_frame = Some(now);
        self.idle_until = None;
        self.armed.take()
    }

    /// Keeps the next frame from being due before `until`, for frames that
    /// ran but presented nothing.
    pub fn hold(&mut self, until: Instant) {
        self.idle_until = Some(until);
    }

    fn due_at(&self) -> Option<Instant> {
        let paced = self
            .last_frame
            .zip(self.interval)
            .map(|(last, interval)| last + interval);
        paced.max(self.idle_until)
    }
}

impl FrameScheduler for PacedScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        if let Some(previous) = self.armed.replace(handle) {
            tracing::trace!(previous = previous.raw(), "frame request superseded");
        }
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.armed == Some(handle) {
            self.armed = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_frames_are_due_immediately() {
        let now = Instant::now();
        let mut scheduler = PacedScheduler::new(None);
        assert_eq!(scheduler.take(now), None);
        let handle = scheduler.request_frame();
        assert!(scheduler.ready(now));
        assert_eq!(scheduler.take(now), Some(handle));
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn capped_frames_wait_for_interval() {
        let start = Instant::now();
        let mut scheduler = PacedScheduler::new(Some(10.0));
        scheduler.request_frame();
        assert!(scheduler.take(start).is_some());
        let second = scheduler.request_frame();
        assert_eq!(scheduler.deadline(), Some(start + Duration::from_millis(100)));
        assert_eq!(scheduler.take(start + Duration::from_millis(50)), None);
        assert_eq!(
            scheduler.take(start + Duration::from_millis(100)),
            Some(second)
        );
    }

    #[test]
    fn cancelling_only_affects_the_armed_handle() {
        let mut scheduler = PacedScheduler::new(None);
        let first = scheduler.request_frame();
        scheduler.cancel_frame(first);
        assert!(!scheduler.is_armed());
        let second = scheduler.request_frame();
        scheduler.cancel_frame(first);
        assert!(scheduler.is_armed());
        assert_ne!(first, second);
    }

    #[test]
    fn held_frames_wait_even_when_uncapped() {
        let now = Instant::now();
        let mut scheduler = PacedScheduler::new(None);
        scheduler.request_frame();
        scheduler.take(now);
        let next = scheduler.request_frame();
        scheduler.hold(now + Duration::from_millis(16));
        assert!(!scheduler.ready(now));
        assert_eq!(scheduler.deadline(), Some(now + Duration::from_millis(16)));
        assert_eq!(scheduler.take(now + Duration::from_millis(16)), Some(next));

        // Taking clears the hold.
        scheduler.request_frame();
        assert!(scheduler.ready(now + Duration::from_millis(16)));
    }

    #[test]
    fn hold_never_shortens_the_fps_interval() {
        let start = Instant::now();
        let mut scheduler = PacedScheduler::new(Some(10.0));
        scheduler.request_frame();
        scheduler.take(start);
        scheduler.request_frame();
        scheduler.hold(start + Duration::from_millis(16));
        assert_eq!(scheduler.deadline(), Some(start + Duration::from_millis(100)));
    }

    #[test]
    fn invalid_fps_means_uncapped() {
        let now = Instant::now();
        let mut scheduler = PacedScheduler::new(Some(0.0));
        scheduler.request_frame();
        scheduler.take(now);
        scheduler.request_frame();
        assert_eq!(scheduler.deadline(), None);
        assert!(scheduler.ready(now));
    }
}
