use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::{Quat, Vec3};

use tether::{
    ClientId, LoopbackHub, LoopbackPort, ManualClock, NetworkClock, NetworkStats,
    NetworkedTransform, ObjectId, PlatformMap, SERVER_CLIENT_ID, Scheduler, SessionContext,
    Tickable, TransformTable,
};

use crate::config::SandboxConfig;
use crate::events::{DisconnectReason, SandboxEvent};
use crate::simulation::{PLATFORM, heading, update_platform, walk_toward, wander};

const CRATE_OBJECT: ObjectId = 1;
const CRATE_SEAT: Vec3 = Vec3::new(0.0, 0.5, 2.0);
const CLIENT_OBJECT_BASE: ObjectId = 100;
const BOARDING_RANGE: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Wandering,
    Approaching,
    Riding,
}

struct Endpoint {
    client_id: ClientId,
    session: SessionContext,
    port: LoopbackPort,
    table: TransformTable<LoopbackPort>,
}

impl Endpoint {
    fn join(hub: &LoopbackHub, session: SessionContext) -> Self {
        let client_id = session.local_client_id();
        Self {
            client_id,
            port: hub.connect(client_id),
            session,
            table: TransformTable::new(),
        }
    }

    fn spawn(&mut self, object_id: ObjectId, owner: ClientId, config: &SandboxConfig) {
        let mut transform = NetworkedTransform::new(
            object_id,
            owner,
            self.session.clone(),
            config.sync.clone(),
            self.port.clone(),
        );
        if self.session.is_server() && owner != SERVER_CLIENT_ID {
            let max_move = config.max_move;
            transform.set_validator(move |from, to| from.distance(to) <= max_move);
        }
        if self.table.spawn(transform).is_err() {
            log::warn!("object {} already exists on {}", object_id, self.client_id);
        }
    }

    fn deliver(&mut self) -> usize {
        let messages = self.port.drain();
        self.table.dispatch_all(messages)
    }
}

/// Scripted owner living on one client.
struct Pilot {
    index: u32,
    client_id: ClientId,
    object_id: ObjectId,
    phase: Rc<Cell<Phase>>,
    distance_to_seat: Rc<Cell<f32>>,
    seat: Vec3,
    boarded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SandboxStats {
    pub frames: u64,
    pub max_error: f32,
    pub error_sum: f64,
    pub error_samples: u64,
    pub sync_events: u64,
}

impl SandboxStats {
    pub fn mean_error(&self) -> f32 {
        if self.error_samples == 0 {
            return 0.0;
        }
        (self.error_sum / self.error_samples as f64) as f32
    }
}

struct SandboxWorld {
    config: SandboxConfig,
    clock: Rc<ManualClock>,
    platforms: Rc<RefCell<PlatformMap>>,
    hub: LoopbackHub,
    server: Endpoint,
    clients: Vec<Endpoint>,
    pilots: Vec<Pilot>,
    pending_events: VecDeque<SandboxEvent>,
    stats: SandboxStats,
    last_time: f32,
    last_report: f32,
}

/// One server and a handful of clients sharing a moving platform, all in
/// this process and connected through a lossy loopback network.
pub struct SyncSandbox {
    scheduler: Scheduler,
    world: SandboxWorld,
    running: Arc<AtomicBool>,
}

impl SyncSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        let clock = Rc::new(ManualClock::default());
        let platforms = Rc::new(RefCell::new(PlatformMap::new()));
        update_platform(&mut platforms.borrow_mut(), 0.0);

        let conditions = config.global_packet_loss.clone().unwrap_or_default();
        let hub = LoopbackHub::new(clock.clone(), conditions, config.seed);
        let mut scheduler = Scheduler::new(config.frame_rate).drive_clock(clock.clone());
        let mut pending_events = VecDeque::new();

        let mut server = Endpoint::join(
            &hub,
            SessionContext::server(clock.clone(), platforms.clone()),
        );
        server.spawn(CRATE_OBJECT, SERVER_CLIENT_ID, &config);
        if let Some(crate_box) = server.table.get_mut(CRATE_OBJECT) {
            crate_box.set_parent(PLATFORM);
        }

        let mut clients = Vec::new();
        let mut pilots = Vec::new();
        for index in 0..config.clients {
            let client_id = index + 1;
            let session = SessionContext::client(client_id, clock.clone(), platforms.clone());
            clients.push(Endpoint::join(&hub, session));
            pending_events.push_back(SandboxEvent::ClientJoined { client_id });

            let pilot = Pilot {
                index,
                client_id,
                object_id: CLIENT_OBJECT_BASE + index,
                phase: Rc::new(Cell::new(Phase::Wandering)),
                distance_to_seat: Rc::new(Cell::new(f32::INFINITY)),
                seat: Vec3::new(index as f32 - 1.0, 0.5, -1.0),
                boarded: false,
            };
            schedule_boarding(&mut scheduler, &pilot, &config);
            pilots.push(pilot);
        }

        for pilot in &pilots {
            server.spawn(pilot.object_id, pilot.client_id, &config);
        }
        for client in &mut clients {
            client.spawn(CRATE_OBJECT, SERVER_CLIENT_ID, &config);
            for pilot in &pilots {
                client.spawn(pilot.object_id, pilot.client_id, &config);
            }
        }

        Self {
            scheduler,
            world: SandboxWorld {
                config,
                clock,
                platforms,
                hub,
                server,
                clients,
                pilots,
                pending_events,
                stats: SandboxStats::default(),
                last_time: 0.0,
                last_report: 0.0,
            },
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.now() < self.world.config.duration_secs
    }

    pub fn now(&self) -> f32 {
        self.world.clock.now()
    }

    /// Feeds one frame of wall time; returns the fixed steps simulated.
    pub fn frame(&mut self, delta: f32) -> u32 {
        self.scheduler.advance(delta, &mut [&mut self.world])
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SandboxEvent> + '_ {
        self.world.pending_events.drain(..)
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.world.hub.stats()
    }

    pub fn stats(&self) -> &SandboxStats {
        &self.world.stats
    }

    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for client in &self.world.clients {
            client.session.disconnect();
            self.world.hub.disconnect(client.client_id);
            self.world
                .pending_events
                .push_back(SandboxEvent::ClientDisconnected {
                    client_id: client.client_id,
                    reason: DisconnectReason::Shutdown,
                });
        }
        self.world.server.session.disconnect();
        self.world.clients.clear();
    }
}

fn schedule_boarding(scheduler: &mut Scheduler, pilot: &Pilot, config: &SandboxConfig) {
    let phase = Rc::clone(&pilot.phase);
    let delay = config.boarding_delay_secs * (pilot.index + 1) as f32;
    scheduler.wait_for(delay, move || phase.set(Phase::Approaching));

    let check_phase = Rc::clone(&pilot.phase);
    let distance = Rc::clone(&pilot.distance_to_seat);
    let phase = Rc::clone(&pilot.phase);
    scheduler.wait_until(
        move || check_phase.get() == Phase::Approaching && distance.get() <= BOARDING_RANGE,
        move || phase.set(Phase::Riding),
    );
}

impl SandboxWorld {
    fn drive_pilots(&mut self, now: f32, dt: f32) {
        let deck = self.platforms.borrow().get(PLATFORM).copied();

        for (pilot, endpoint) in self.pilots.iter_mut().zip(self.clients.iter_mut()) {
            let Some(body) = endpoint.table.get_mut(pilot.object_id) else {
                continue;
            };
            let current = body.position();
            let seat = deck.map(|frame| frame.transform_point3(pilot.seat));

            let next = match (pilot.phase.get(), seat) {
                (Phase::Approaching, Some(seat)) => {
                    let next = walk_toward(current, seat, dt);
                    pilot.distance_to_seat.set(next.distance(seat));
                    next
                }
                (Phase::Riding, Some(seat)) => {
                    if !pilot.boarded {
                        pilot.boarded = true;
                        body.set_parent(PLATFORM);
                        self.pending_events.push_back(SandboxEvent::Boarded {
                            client_id: pilot.client_id,
                            platform: PLATFORM,
                        });
                    }
                    seat
                }
                _ => wander(pilot.index, now),
            };

            let facing = heading(current, next, body.rotation());
            body.set_pose(next, facing);
        }
    }

    fn drive_crate(&mut self) {
        let deck = self.platforms.borrow().get(PLATFORM).copied();
        if let (Some(frame), Some(crate_box)) =
            (deck, self.server.table.get_mut(CRATE_OBJECT))
        {
            crate_box.set_pose(frame.transform_point3(CRATE_SEAT), Quat::IDENTITY);
        }
    }

    fn deliver(&mut self) {
        // Second round delivers what the server relayed in the first.
        for _ in 0..2 {
            self.hub.pump();
            self.server.deliver();
            for client in &mut self.clients {
                client.deliver();
            }
        }
    }

    fn collect_events(&mut self) {
        let endpoints = std::iter::once(&mut self.server).chain(self.clients.iter_mut());
        for endpoint in endpoints {
            for event in endpoint.table.drain_events() {
                log::debug!("[{}] {}: {:?}", endpoint.client_id, event.as_str(), event);
                self.stats.sync_events += 1;
                self.pending_events.push_back(SandboxEvent::Sync {
                    endpoint: endpoint.client_id,
                    event,
                });
            }
        }
    }

    /// Distance between each owner's pose and every remote view of it.
    fn measure(&mut self) {
        for pilot in &self.pilots {
            let Some(owner) = self
                .clients
                .iter()
                .find(|client| client.client_id == pilot.client_id)
                .and_then(|client| client.table.get(pilot.object_id))
            else {
                continue;
            };
            let truth = owner.position();

            let views = std::iter::once(&self.server)
                .chain(self.clients.iter())
                .filter(|endpoint| endpoint.client_id != pilot.client_id)
                .filter_map(|endpoint| endpoint.table.get(pilot.object_id))
                .filter(|view| view.last_received().is_some());
            for view in views {
                let error = view.position().distance(truth);
                self.stats.max_error = self.stats.max_error.max(error);
                self.stats.error_sum += f64::from(error);
                self.stats.error_samples += 1;
            }
        }
    }

    fn report(&mut self, now: f32) {
        if now - self.last_report < self.config.report_interval_secs {
            return;
        }
        self.last_report = now;

        let net = self.hub.stats();
        log::info!(
            "t={:.1}s sent={} delivered={} dropped={} ({:.1}%) mean error {:.3} max {:.3}",
            now,
            net.packets_sent,
            net.packets_delivered,
            net.packets_dropped,
            net.loss_percent(),
            self.stats.mean_error(),
            self.stats.max_error
        );
        if let Some(crate_box) = self.server.table.get(CRATE_OBJECT) {
            let stats = crate_box.stats();
            log::debug!(
                "crate: sent {} suppressed {}",
                stats.samples_sent,
                stats.suppressed_ticks
            );
        }
    }
}

impl Tickable for SandboxWorld {
    fn tick(&mut self, now: f32) {
        let dt = now - self.last_time;
        self.last_time = now;
        self.stats.frames += 1;

        update_platform(&mut self.platforms.borrow_mut(), now);
        self.drive_pilots(now, dt);
        self.drive_crate();

        self.deliver();
        self.server.table.tick(now);
        for client in &mut self.clients {
            client.table.tick(now);
        }

        self.collect_events();
        self.measure();
        self.report(now);
    }
}
