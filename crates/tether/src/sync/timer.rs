/// Countdown measured against the network clock. A timer that was never
/// started counts as finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InactivityTimer {
    duration: f32,
    started_at: Option<f32>,
}

impl InactivityTimer {
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            started_at: None,
        }
    }

    pub fn start(&mut self, now: f32) {
        self.started_at = Some(now);
    }

    /// Alias of [`start`](Self::start); restarts the countdown.
    pub fn reset(&mut self, now: f32) {
        self.start(now);
    }

    pub fn is_finished(&self, now: f32) -> bool {
        match self.started_at {
            Some(started) => now - started >= self.duration,
            None => true,
        }
    }
}
