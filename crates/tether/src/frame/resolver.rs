use glam::{Affine3A, Vec3};

use super::{ParentRef, PlatformRegistry};

/// Converts positions between world space and the space of a moving
/// platform. Every conversion falls back to identity when the platform is
/// unknown so a vanished platform degrades to world-space values.
pub struct FrameResolver<'a> {
    registry: &'a dyn PlatformRegistry,
}

impl<'a> FrameResolver<'a> {
    pub fn new(registry: &'a dyn PlatformRegistry) -> Self {
        Self { registry }
    }

    pub fn parent_frame(&self, parent: ParentRef) -> Option<Affine3A> {
        if parent.is_none() {
            return None;
        }
        self.registry.lookup(parent)
    }

    pub fn to_relative(&self, world_pos: Vec3, parent: ParentRef) -> Vec3 {
        let Some(frame) = self.parent_frame(parent) else {
            return world_pos;
        };
        if !is_invertible(&frame) {
            return world_pos;
        }
        frame.inverse().transform_point3(world_pos)
    }

    pub fn to_world(&self, relative_pos: Vec3, parent: ParentRef) -> Vec3 {
        match self.parent_frame(parent) {
            Some(frame) => frame.transform_point3(relative_pos),
            None => relative_pos,
        }
    }
}

fn is_invertible(frame: &Affine3A) -> bool {
    let det = frame.matrix3.determinant();
    det.is_finite() && det.abs() > f32::EPSILON
}
