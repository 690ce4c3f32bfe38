use serde::{Deserialize, Serialize};

use crate::buffer::{DEFAULT_BUFFER_CAPACITY, DEFAULT_LATENCY_WINDOW};
use crate::net::DEFAULT_SEND_RATE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Owner samples per second.
    pub send_rate: f32,
    pub interpolate: bool,
    /// Whether a server interpolates objects it does not own.
    pub interpolate_server: bool,
    /// Extra render lag in seconds on top of the measured latency.
    pub interp_delay: f32,
    /// Seconds an unchanged pose keeps being sent before the owner goes quiet.
    pub inactive_delay: f32,
    pub latency_window: usize,
    pub buffer_capacity: usize,
    /// Per-frame jump, in world units, reported as a large correction.
    pub correction_warn_distance: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_rate: DEFAULT_SEND_RATE,
            interpolate: true,
            interpolate_server: true,
            interp_delay: 0.1,
            inactive_delay: 0.5,
            latency_window: DEFAULT_LATENCY_WINDOW,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            correction_warn_distance: 2.0,
        }
    }
}

impl SyncConfig {
    pub fn send_interval(&self) -> f32 {
        if self.send_rate > 0.0 {
            1.0 / self.send_rate
        } else {
            f32::INFINITY
        }
    }

    /// Server interpolation requires interpolation.
    pub fn validated(mut self) -> Self {
        if !self.interpolate {
            self.interpolate_server = false;
        }
        self.latency_window = self.latency_window.max(1);
        self.buffer_capacity = self.buffer_capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.send_rate, 20.0);
        assert_eq!(config.send_interval(), 0.05);
        assert_eq!(config.inactive_delay, 0.5);
        assert_eq!(config.buffer_capacity, 20);
        assert!(config.interpolate_server);
    }

    #[test]
    fn validated_disables_server_interpolation() {
        let config = SyncConfig {
            interpolate: false,
            latency_window: 0,
            ..Default::default()
        }
        .validated();
        assert!(!config.interpolate_server);
        assert_eq!(config.latency_window, 1);
    }

    #[test]
    fn zero_rate_never_sends() {
        let config = SyncConfig {
            send_rate: 0.0,
            ..Default::default()
        };
        assert!(config.send_interval().is_infinite());
    }
}
