use glam::{Quat, Vec3};

use tether::{ParentRef, PlatformMap};

pub const PLATFORM: ParentRef = ParentRef {
    owner_id: 1,
    slot_index: 0,
};

const PLATFORM_SPEED: f32 = 0.15;
const PLATFORM_RADIUS: f32 = 12.0;
const WALK_SPEED: f32 = 6.0;

/// Platform sweeping a slow circle around the origin, turning as it goes.
pub fn update_platform(platforms: &mut PlatformMap, time: f32) {
    let angle = time * PLATFORM_SPEED;
    let (sin, cos) = angle.sin_cos();
    let translation = Vec3::new(cos * PLATFORM_RADIUS, 0.5, sin * PLATFORM_RADIUS);
    platforms.place(PLATFORM, translation, Quat::from_rotation_y(-angle));
}

/// Idle route of one client: a small loop around its spawn point.
pub fn wander(client_index: u32, time: f32) -> Vec3 {
    let phase = client_index as f32 * 2.1;
    let home = Vec3::new(phase.cos() * 4.0, 0.0, phase.sin() * 4.0);
    let (sin, cos) = (time * 0.8 + phase).sin_cos();
    home + Vec3::new(cos * 1.5, 0.0, sin * 1.5)
}

pub fn walk_toward(current: Vec3, target: Vec3, dt: f32) -> Vec3 {
    let offset = target - current;
    let step = WALK_SPEED * dt;
    if offset.length() <= step {
        target
    } else {
        current + offset.normalize() * step
    }
}

/// Facing for a body that moved from `from` to `to`.
pub fn heading(from: Vec3, to: Vec3, fallback: Quat) -> Quat {
    let flat = Vec3::new(to.x - from.x, 0.0, to.z - from.z);
    if flat.length_squared() < 1e-6 {
        return fallback;
    }
    Quat::from_rotation_y(flat.x.atan2(flat.z))
}
