use std::cell::RefCell;
use std::collections::HashMap;

use glam::{Affine3A, Quat, Vec3};

use super::ParentRef;

/// Read-only view of the moving platforms currently in the scene.
///
/// Lookups happen every time a frame is needed. Platforms move, get
/// destroyed or get reparented between frames, so callers never hold on to
/// the returned transform.
pub trait PlatformRegistry {
    fn lookup(&self, parent: ParentRef) -> Option<Affine3A>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlatforms;

impl PlatformRegistry for NoPlatforms {
    fn lookup(&self, _parent: ParentRef) -> Option<Affine3A> {
        None
    }
}

#[derive(Debug, Default, Clone)]
pub struct PlatformMap {
    frames: HashMap<ParentRef, Affine3A>,
}

impl PlatformMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parent: ParentRef, frame: Affine3A) {
        if parent.is_none() {
            return;
        }
        self.frames.insert(parent, frame);
    }

    pub fn place(&mut self, parent: ParentRef, translation: Vec3, rotation: Quat) {
        self.insert(
            parent,
            Affine3A::from_rotation_translation(rotation, translation),
        );
    }

    pub fn remove(&mut self, parent: ParentRef) -> Option<Affine3A> {
        self.frames.remove(&parent)
    }

    pub fn get(&self, parent: ParentRef) -> Option<&Affine3A> {
        self.frames.get(&parent)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl PlatformRegistry for PlatformMap {
    fn lookup(&self, parent: ParentRef) -> Option<Affine3A> {
        if parent.is_none() {
            return None;
        }
        self.frames.get(&parent).copied()
    }
}

impl<R: PlatformRegistry> PlatformRegistry for RefCell<R> {
    fn lookup(&self, parent: ParentRef) -> Option<Affine3A> {
        self.borrow().lookup(parent)
    }
}

impl<R: PlatformRegistry + ?Sized> PlatformRegistry for &R {
    fn lookup(&self, parent: ParentRef) -> Option<Affine3A> {
        (**self).lookup(parent)
    }
}
