use std::rc::Rc;

use super::Tickable;
use super::timestep::FixedTimestep;
use crate::session::ManualClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollHandle(u64);

enum Trigger {
    Until(Box<dyn FnMut() -> bool>),
    After(f32),
}

struct Continuation {
    handle: PollHandle,
    trigger: Trigger,
    action: Box<dyn FnOnce()>,
}

/// Fixed-step frame driver with one-shot continuations.
///
/// Continuations are checked once per step before the tickables run and
/// are removed after they fire.
pub struct Scheduler {
    timestep: FixedTimestep,
    now: f32,
    clock: Option<Rc<ManualClock>>,
    continuations: Vec<Continuation>,
    next_handle: u64,
}

impl Scheduler {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            timestep: FixedTimestep::new(tick_rate),
            now: 0.0,
            clock: None,
            continuations: Vec::new(),
            next_handle: 0,
        }
    }

    /// Keeps `clock` at the scheduler's time on every step.
    pub fn drive_clock(mut self, clock: Rc<ManualClock>) -> Self {
        clock.set(self.now);
        self.clock = Some(clock);
        self
    }

    pub fn now(&self) -> f32 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.continuations.len()
    }

    pub fn is_pending(&self, handle: PollHandle) -> bool {
        self.continuations.iter().any(|c| c.handle == handle)
    }

    /// Runs `action` once, on the first step where `check` returns true.
    pub fn wait_until(
        &mut self,
        check: impl FnMut() -> bool + 'static,
        action: impl FnOnce() + 'static,
    ) -> PollHandle {
        self.register(Trigger::Until(Box::new(check)), Box::new(action))
    }

    /// Runs `action` once the scheduler clock reaches `seconds` from now.
    pub fn wait_for(&mut self, seconds: f32, action: impl FnOnce() + 'static) -> PollHandle {
        let deadline = self.now + seconds.max(0.0);
        self.register(Trigger::After(deadline), Box::new(action))
    }

    /// Drops a pending continuation without running it. Returns false if it
    /// already fired or was cancelled.
    pub fn cancel(&mut self, handle: PollHandle) -> bool {
        match self.continuations.iter().position(|c| c.handle == handle) {
            Some(index) => {
                self.continuations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Feeds one frame of wall time. Returns the number of fixed steps run.
    pub fn advance(&mut self, delta: f32, tickables: &mut [&mut dyn Tickable]) -> u32 {
        self.timestep.feed(delta);
        let mut steps = 0;
        while self.timestep.take_step() {
            self.now += self.timestep.step();
            if let Some(clock) = &self.clock {
                clock.set(self.now);
            }
            self.poll();
            for tickable in tickables.iter_mut() {
                tickable.tick(self.now);
            }
            steps += 1;
        }
        steps
    }

    fn register(&mut self, trigger: Trigger, action: Box<dyn FnOnce()>) -> PollHandle {
        let handle = PollHandle(self.next_handle);
        self.next_handle += 1;
        self.continuations.push(Continuation {
            handle,
            trigger,
            action,
        });
        handle
    }

    fn poll(&mut self) {
        let now = self.now;
        let mut index = 0;
        while index < self.continuations.len() {
            let ready = match &mut self.continuations[index].trigger {
                Trigger::Until(check) => check(),
                Trigger::After(deadline) => now >= *deadline,
            };
            if ready {
                let continuation = self.continuations.remove(index);
                (continuation.action)();
            } else {
                index += 1;
            }
        }
    }
}
