mod scheduler;
mod timestep;

pub use scheduler::{PollHandle, Scheduler};
pub use timestep::FixedTimestep;

/// Something advanced once per fixed step.
pub trait Tickable {
    fn tick(&mut self, now: f32);
}
