use std::time::{Duration, Instant};

/// Frame-callback registration for the procedural variant.
///
/// The host asks [`FrameScheduler::ready_for_frame`] on every idle tick and
/// requests a redraw when it answers true. Cancelling the registration makes
/// the scheduler answer false forever after, so a torn-down backdrop can
/// never be driven again.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    registered: bool,
    interval: Option<Duration>,
    last_frame: Option<Instant>,
    frames: u64,
}

impl FrameScheduler {
    /// `target_fps` of None (or a non-positive value) renders on every
    /// display refresh.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self {
            registered: false,
            interval,
            last_frame: None,
            frames: 0,
        }
    }

    pub fn register(&mut self) {
        if !self.registered {
            tracing::trace!("frame callback registered");
        }
        self.registered = true;
    }

    /// Cancels the registration; returns whether one was live.
    pub fn cancel(&mut self) -> bool {
        let was_registered = self.registered;
        self.registered = false;
        if was_registered {
            tracing::trace!(frames = self.frames, "frame callback cancelled");
        }
        was_registered
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        if !self.registered {
            return false;
        }
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    /// When the next frame becomes due, for hosts that sleep until then.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.registered {
            return None;
        }
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => Some(last + interval),
            _ => None,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_frame = Some(now);
        self.frames = self.frames.saturating_add(1);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}
