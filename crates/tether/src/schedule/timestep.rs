/// Longest frame the accumulator accepts; a stall never replays more.
const MAX_FRAME_DELTA: f32 = 0.25;

/// Splits variable frame deltas into whole fixed steps.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: f32,
    backlog: f32,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            step: 1.0 / tick_rate.max(1) as f32,
            backlog: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    pub fn feed(&mut self, delta: f32) {
        self.backlog += delta.clamp(0.0, MAX_FRAME_DELTA);
    }

    /// Takes one step out of the backlog if a whole one is owed.
    pub fn take_step(&mut self) -> bool {
        if self.backlog < self.step {
            return false;
        }
        self.backlog -= self.step;
        true
    }
}
