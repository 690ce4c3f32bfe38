mod rolling;
mod timed;

use glam::{Quat, Vec3};

pub use rolling::{DEFAULT_LATENCY_WINDOW, RollingAverage};
pub use timed::{BufferEntry, DEFAULT_BUFFER_CAPACITY, TimedSampleBuffer, WorldFn};

// Blend helpers clamp the fraction so a late render clock never overshoots.

pub fn lerp_f32(from: f32, to: f32, t: f32) -> f32 {
    let t = clamp_fraction(t);
    from + (to - from) * t
}

pub fn lerp_vec3(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    from.lerp(to, clamp_fraction(t))
}

pub fn slerp_quat(from: Quat, to: Quat, t: f32) -> Quat {
    let t = clamp_fraction(t);
    if from.dot(to) < 0.0 {
        from.slerp(-to, t)
    } else {
        from.slerp(to, t)
    }
}

fn clamp_fraction(t: f32) -> f32 {
    if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
}
