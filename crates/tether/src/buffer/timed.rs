use std::collections::VecDeque;

use glam::Affine3A;

use crate::frame::{ParentRef, PlatformRegistry};

pub const DEFAULT_BUFFER_CAPACITY: usize = 20;

/// Maps a platform-relative value into world space given the platform frame.
pub type WorldFn<T> = fn(&Affine3A, T) -> T;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferEntry<T> {
    pub time: f32,
    pub value: T,
    pub parent: Option<ParentRef>,
}

/// Timestamped values kept in ascending time order, bounded to `capacity`
/// entries. Queries blend the two entries around a time and hold the edge
/// entries outside the buffered range.
#[derive(Debug, Clone)]
pub struct TimedSampleBuffer<T> {
    entries: VecDeque<BufferEntry<T>>,
    capacity: usize,
    to_world: Option<WorldFn<T>>,
}

impl<T: Copy + Default> TimedSampleBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
            to_world: None,
        }
    }

    /// Entries tagged with a parent are passed through `to_world` before
    /// they are blended.
    pub fn with_world_fn(capacity: usize, to_world: WorldFn<T>) -> Self {
        Self {
            to_world: Some(to_world),
            ..Self::new(capacity)
        }
    }

    pub fn insert(&mut self, time: f32, value: T, parent: Option<ParentRef>) {
        let entry = BufferEntry {
            time,
            value,
            parent: parent.and_then(ParentRef::as_option),
        };

        let append = self.entries.back().is_none_or(|last| last.time <= time);
        if append {
            self.entries.push_back(entry);
        } else {
            let index = self
                .upper_bound(time)
                .unwrap_or(self.entries.len());
            self.entries.insert(index, entry);
        }

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Value at `time`, holding the first or last entry outside the buffered
    /// range. An empty buffer yields `T::default()`.
    pub fn interpolate_at<F>(&self, time: f32, registry: &dyn PlatformRegistry, interp: F) -> T
    where
        F: Fn(T, T, f32) -> T,
    {
        let (Some(first), Some(last)) = (self.entries.front(), self.entries.back()) else {
            return T::default();
        };

        match self.upper_bound(time) {
            None => self.resolve(last, registry),
            Some(0) => self.resolve(first, registry),
            Some(index) => self.blend(index, time, registry, interp),
        }
    }

    /// Like [`interpolate_at`](Self::interpolate_at), but a `time` before the
    /// first entry moves `current` toward that entry by
    /// `(first.time - time) * rate` instead of snapping to it. An empty buffer
    /// yields `current`.
    pub fn interpolate_toward<F>(
        &self,
        time: f32,
        current: T,
        rate: f32,
        registry: &dyn PlatformRegistry,
        interp: F,
    ) -> T
    where
        F: Fn(T, T, f32) -> T,
    {
        let (Some(first), Some(last)) = (self.entries.front(), self.entries.back()) else {
            return current;
        };

        match self.upper_bound(time) {
            None => self.resolve(last, registry),
            Some(0) => {
                let fraction = (first.time - time) * rate;
                interp(current, self.resolve(first, registry), fraction)
            }
            Some(index) => self.blend(index, time, registry, interp),
        }
    }

    pub fn latest(&self) -> Option<&BufferEntry<T>> {
        self.entries.back()
    }

    pub fn earliest(&self) -> Option<&BufferEntry<T>> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferEntry<T>> {
        self.entries.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn upper_bound(&self, time: f32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.time > time)
    }

    fn blend<F>(&self, index: usize, time: f32, registry: &dyn PlatformRegistry, interp: F) -> T
    where
        F: Fn(T, T, f32) -> T,
    {
        let upper = &self.entries[index];
        let lower = &self.entries[index - 1];
        let fraction = (time - lower.time) / (upper.time - lower.time);
        interp(
            self.resolve(lower, registry),
            self.resolve(upper, registry),
            fraction,
        )
    }

    fn resolve(&self, entry: &BufferEntry<T>, registry: &dyn PlatformRegistry) -> T {
        let (Some(parent), Some(to_world)) = (entry.parent, self.to_world) else {
            return entry.value;
        };
        match registry.lookup(parent) {
            Some(frame) => to_world(&frame, entry.value),
            None => entry.value,
        }
    }
}

impl<T: Copy + Default> Default for TimedSampleBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
