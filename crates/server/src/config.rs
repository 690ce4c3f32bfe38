use tether::{PacketLossSimulation, SyncConfig};

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub frame_rate: u32,
    pub clients: u32,
    pub duration_secs: f32,
    pub seed: u64,
    /// Largest distance the server accepts between two submitted positions.
    pub max_move: f32,
    pub boarding_delay_secs: f32,
    pub report_interval_secs: f32,
    pub sync: SyncConfig,
    pub global_packet_loss: Option<PacketLossSimulation>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            frame_rate: tether::net::DEFAULT_FRAME_RATE,
            clients: 3,
            duration_secs: 20.0,
            seed: 1,
            max_move: 5.0,
            boarding_delay_secs: 4.0,
            report_interval_secs: 2.0,
            sync: SyncConfig::default(),
            global_packet_loss: None,
        }
    }
}
