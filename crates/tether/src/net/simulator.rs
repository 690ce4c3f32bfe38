use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::protocol::ClientId;
use super::stats::{NetworkStats, PacketLossSimulation};

#[derive(Debug)]
struct DelayedPacket {
    release_time: f32,
    sequence: u64,
    recipient: ClientId,
    data: Vec<u8>,
}

impl PartialEq for DelayedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedPacket {}

impl PartialOrd for DelayedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; equal release times keep send order.
        other
            .release_time
            .total_cmp(&self.release_time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Datagram delay line. Packets are held until the network clock passes
/// their release time, dropped at random, and reordered by jitter.
#[derive(Debug)]
pub struct NetworkSimulator {
    default_config: PacketLossSimulation,
    configs: HashMap<ClientId, PacketLossSimulation>,
    rng: StdRng,
    queue: BinaryHeap<DelayedPacket>,
    next_sequence: u64,
    stats: NetworkStats,
}

impl NetworkSimulator {
    pub fn new(default_config: PacketLossSimulation, seed: u64) -> Self {
        Self {
            default_config,
            configs: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
            queue: BinaryHeap::new(),
            next_sequence: 0,
            stats: NetworkStats::default(),
        }
    }

    /// Perfect link: no loss, no delay.
    pub fn lossless() -> Self {
        Self::new(PacketLossSimulation::default(), 0)
    }

    /// Overrides the link conditions toward one recipient.
    pub fn set_config(&mut self, recipient: ClientId, config: PacketLossSimulation) {
        if config.enabled {
            self.configs.insert(recipient, config);
        } else {
            self.configs.remove(&recipient);
        }
    }

    pub fn config_for(&self, recipient: ClientId) -> &PacketLossSimulation {
        self.configs
            .get(&recipient)
            .unwrap_or(&self.default_config)
    }

    /// Queues a datagram sent at `now`. Returns false if it was lost.
    pub fn enqueue(&mut self, now: f32, recipient: ClientId, data: Vec<u8>) -> bool {
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += data.len() as u64;

        let config = self
            .configs
            .get(&recipient)
            .unwrap_or(&self.default_config);
        if config.should_drop(&mut self.rng) {
            self.stats.packets_dropped += 1;
            log::trace!("dropped {} bytes to client {}", data.len(), recipient);
            return false;
        }
        let delay = config.delay_secs(&mut self.rng);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(DelayedPacket {
            release_time: now + delay,
            sequence,
            recipient,
            data,
        });
        true
    }

    pub fn take_released(&mut self, now: f32) -> Vec<(ClientId, Vec<u8>)> {
        let mut packets = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|delayed| delayed.release_time <= now)
        {
            if let Some(delayed) = self.queue.pop() {
                self.stats.packets_delivered += 1;
                self.stats.bytes_delivered += delayed.data.len() as u64;
                packets.push((delayed.recipient, delayed.data));
            }
        }
        packets
    }

    /// Forgets queued packets addressed to a departed client.
    pub fn discard_for(&mut self, recipient: ClientId) {
        self.queue.retain(|delayed| delayed.recipient != recipient);
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }
}
