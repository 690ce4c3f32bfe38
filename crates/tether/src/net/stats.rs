use rand::Rng;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl PacketLossSimulation {
    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.gen_range(0.0..100.0) < self.loss_percent
    }

    /// One-way delay in seconds. Jitter makes later packets overtake earlier
    /// ones, which is how reordering shows up.
    pub fn delay_secs(&self, rng: &mut impl Rng) -> f32 {
        if !self.enabled || (self.max_latency_ms == 0 && self.jitter_ms == 0) {
            return 0.0;
        }
        let base = self.min_latency_ms.min(self.max_latency_ms);
        let range = self.max_latency_ms.saturating_sub(base);
        let spread = if range > 0 { rng.gen_range(0..=range) } else { 0 };
        let jitter = if self.jitter_ms > 0 {
            rng.gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        (base + spread + jitter) as f32 / 1000.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_delivered: u64,
    pub packets_dropped: u64,
    pub packets_malformed: u64,
    pub bytes_sent: u64,
    pub bytes_delivered: u64,
}

impl NetworkStats {
    pub fn loss_percent(&self) -> f32 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_dropped as f32 / self.packets_sent as f32 * 100.0
    }
}
