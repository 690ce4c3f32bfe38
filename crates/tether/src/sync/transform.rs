use std::collections::VecDeque;

use glam::{Affine3A, Quat, Vec3};

use super::config::SyncConfig;
use super::events::{SyncError, SyncEvent, SyncStats};
use super::role::OwnershipState;
use super::timer::InactivityTimer;
use crate::buffer::{RollingAverage, TimedSampleBuffer, lerp_vec3, slerp_quat};
use crate::frame::{FrameResolver, ParentRef};
use crate::net::{
    ClientId, ObjectId, RpcChannel, RpcKind, RpcMessage, SERVER_CLIENT_ID, TransformSample,
};
use crate::schedule::Tickable;
use crate::session::SessionContext;

const MAX_PENDING_EVENTS: usize = 256;

/// Server-side check of a submitted move: `(previous_world, requested_world)`.
pub type MoveValidator = Box<dyn Fn(Vec3, Vec3) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SentState {
    position: Vec3,
    rotation: Quat,
    parent: ParentRef,
}

#[derive(Debug, Clone)]
struct ValidatedSample {
    sample: TransformSample,
    payload: Vec<u8>,
}

/// Synchronizes one object's transform between its owner, the server and
/// every observer.
///
/// The gameplay layer writes the pose on the owner with [`set_pose`] and
/// [`set_parent`]; everywhere else the pose is driven by received samples.
/// Poses held here are always world space.
///
/// [`set_pose`]: Self::set_pose
/// [`set_parent`]: Self::set_parent
pub struct NetworkedTransform<C> {
    object_id: ObjectId,
    owner_client_id: ClientId,
    role: OwnershipState,
    session: SessionContext,
    config: SyncConfig,
    channel: C,
    enabled: bool,

    position: Vec3,
    rotation: Quat,
    parent: ParentRef,

    last_sent: Option<SentState>,
    last_send_time: f32,
    inactivity: InactivityTimer,

    validator: Option<MoveValidator>,
    last_validated: Option<ValidatedSample>,

    last_received: Option<TransformSample>,
    velocity: Vec3,
    latency: RollingAverage,
    position_buffer: TimedSampleBuffer<Vec3>,
    rotation_buffer: TimedSampleBuffer<Quat>,

    pending_events: VecDeque<SyncEvent>,
    stats: SyncStats,
}

impl<C: RpcChannel> NetworkedTransform<C> {
    pub fn new(
        object_id: ObjectId,
        owner_client_id: ClientId,
        session: SessionContext,
        config: SyncConfig,
        channel: C,
    ) -> Self {
        let config = config.validated();
        let role = OwnershipState::resolve(
            session.flags(),
            session.local_client_id(),
            owner_client_id,
        );
        Self {
            object_id,
            owner_client_id,
            role,
            session,
            channel,
            enabled: true,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            parent: ParentRef::NONE,
            last_sent: None,
            last_send_time: f32::NEG_INFINITY,
            inactivity: InactivityTimer::new(config.inactive_delay),
            validator: None,
            last_validated: None,
            last_received: None,
            velocity: Vec3::ZERO,
            latency: RollingAverage::new(config.latency_window),
            position_buffer: TimedSampleBuffer::with_world_fn(
                config.buffer_capacity,
                |frame: &Affine3A, position: Vec3| frame.transform_point3(position),
            ),
            rotation_buffer: TimedSampleBuffer::new(config.buffer_capacity),
            pending_events: VecDeque::new(),
            stats: SyncStats::default(),
            config,
        }
    }

    pub fn with_validator(mut self, validator: impl Fn(Vec3, Vec3) -> bool + 'static) -> Self {
        self.set_validator(validator);
        self
    }

    pub fn set_validator(&mut self, validator: impl Fn(Vec3, Vec3) -> bool + 'static) {
        self.validator = Some(Box::new(validator));
    }

    pub fn with_pose(mut self, position: Vec3, rotation: Quat) -> Self {
        self.set_pose(position, rotation);
        self
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn owner_client_id(&self) -> ClientId {
        self.owner_client_id
    }

    pub fn role(&self) -> OwnershipState {
        self.role
    }

    pub fn is_owner(&self) -> bool {
        self.role.is_owner()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn parent(&self) -> ParentRef {
        self.parent
    }

    pub fn set_pose(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// Platform the object currently rides, or [`ParentRef::NONE`].
    pub fn set_parent(&mut self, parent: ParentRef) {
        self.parent = parent;
    }

    /// Latest observed velocity in world units per second.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn latency(&self) -> f32 {
        self.latency.average()
    }

    pub fn last_received(&self) -> Option<&TransformSample> {
        self.last_received.as_ref()
    }

    pub fn buffered_samples(&self) -> usize {
        self.position_buffer.len()
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.pending_events.drain(..).collect()
    }

    /// Called once the object exists on the network.
    pub fn network_start(&mut self) {
        let now = self.session.now();
        self.last_send_time = now;

        if self.is_owner() {
            self.inactivity.start(now);
        } else if !self.session.is_server() {
            let request = RpcMessage::request(self.object_id, self.session.local_client_id());
            if let Err(e) = self.channel.send_to_server(request) {
                log::warn!("object {}: transform request failed: {}", self.object_id, e);
                self.stats.send_failures += 1;
            }
        }
    }

    /// Owner send step, rate limited to `send_rate`. Returns true when a
    /// sample went out.
    pub fn transmit_if_owner(&mut self) -> bool {
        let now = self.session.now();
        self.transmit_at(now)
    }

    fn transmit_at(&mut self, now: f32) -> bool {
        if !self.is_owner() || !self.enabled || !self.session.is_connected() {
            return false;
        }
        if self.config.send_rate <= 0.0 || now - self.last_send_time < self.config.send_interval() {
            return false;
        }
        self.last_send_time = now;

        let sample = self.current_sample(now);
        let state = SentState {
            position: sample.position,
            rotation: self.rotation,
            parent: sample.parent,
        };
        if self.last_sent != Some(state) {
            self.inactivity.reset(now);
            self.last_sent = Some(state);
        }
        if self.inactivity.is_finished(now) {
            self.stats.suppressed_ticks += 1;
            return false;
        }

        let payload = sample.encode().to_vec();
        let local = self.session.local_client_id();
        let result = if self.session.is_server() {
            let message = RpcMessage::new(self.object_id, RpcKind::ApplyTransform, local, payload);
            self.channel.send_to_all_except(self.owner_client_id, message)
        } else {
            let message = RpcMessage::new(self.object_id, RpcKind::SubmitTransform, local, payload);
            self.channel.send_to_server(message)
        };

        match result {
            Ok(()) => {
                self.stats.samples_sent += 1;
                true
            }
            Err(e) => {
                log::warn!("object {}: send failed: {}", self.object_id, e);
                self.stats.send_failures += 1;
                false
            }
        }
    }

    /// Current pose as a sample. The position is made relative to the
    /// parent only when the parent can be resolved right now.
    fn current_sample(&self, now: f32) -> TransformSample {
        let resolver = self.session.resolver();
        let parent = match resolver.parent_frame(self.parent) {
            Some(_) => self.parent,
            None => ParentRef::NONE,
        };
        let position = resolver.to_relative(self.position, parent);
        TransformSample::new(now, position, self.rotation, parent)
    }

    pub fn handle_rpc(&mut self, message: &RpcMessage) -> bool {
        match message.kind {
            RpcKind::SubmitTransform => self.submit_sample(&message.payload, message.origin),
            RpcKind::ApplyTransform => {
                if self.session.is_server() || message.origin != SERVER_CLIENT_ID {
                    log::warn!(
                        "object {}: apply from client {} ignored",
                        self.object_id,
                        message.origin
                    );
                    self.stats.rejected += 1;
                    self.push_event(SyncEvent::ForeignApply {
                        object_id: self.object_id,
                        sender: message.origin,
                    });
                    return false;
                }
                self.receive_sample(&message.payload, message.origin)
            }
            RpcKind::RequestTransform => self.request_transform(message.origin),
        }
    }

    /// Server side of a client-owned object: validate, apply and relay.
    pub fn submit_sample(&mut self, payload: &[u8], sender: ClientId) -> bool {
        if !self.enabled || !self.session.is_server() || self.is_owner() {
            return false;
        }
        if sender != self.owner_client_id {
            log::warn!(
                "object {}: submit from client {} which does not own it",
                self.object_id,
                sender
            );
            self.stats.rejected += 1;
            self.push_event(SyncEvent::ForeignSubmit {
                object_id: self.object_id,
                sender,
            });
            return false;
        }
        let Some(sample) = self.decode(payload, sender) else {
            return false;
        };

        let (previous, requested) = {
            let resolver = self.session.resolver();
            let previous = match &self.last_validated {
                Some(validated) => {
                    resolver.to_world(validated.sample.position, validated.sample.parent)
                }
                None => self.position,
            };
            (previous, resolver.to_world(sample.position, sample.parent))
        };

        let accepted = self
            .validator
            .as_ref()
            .is_none_or(|validator| validator(previous, requested));
        if !accepted {
            // No correction goes back to the owner; it keeps its local pose.
            log::debug!(
                "object {}: rejected move {} -> {} from {}",
                self.object_id,
                previous,
                requested,
                sender
            );
            self.stats.rejected += 1;
            self.push_event(SyncEvent::MoveRejected {
                object_id: self.object_id,
                sender,
                from: previous,
                to: requested,
            });
            return false;
        }

        self.last_validated = Some(ValidatedSample {
            sample,
            payload: payload.to_vec(),
        });
        self.accept_sample(sample);

        let relay = RpcMessage::new(
            self.object_id,
            RpcKind::ApplyTransform,
            self.session.local_client_id(),
            payload.to_vec(),
        );
        match self.channel.send_to_all_except(self.owner_client_id, relay) {
            Ok(()) => self.stats.samples_relayed += 1,
            Err(e) => {
                log::warn!("object {}: relay failed: {}", self.object_id, e);
                self.stats.send_failures += 1;
            }
        }
        true
    }

    /// Observer side: apply a sample relayed by the server.
    pub fn receive_sample(&mut self, payload: &[u8], sender: ClientId) -> bool {
        if !self.enabled {
            return false;
        }
        if self.is_owner() {
            log::debug!(
                "object {}: owner ignores sample from {}",
                self.object_id,
                sender
            );
            return false;
        }
        let Some(sample) = self.decode(payload, sender) else {
            return false;
        };
        self.accept_sample(sample);
        true
    }

    /// Server answer to a joining client.
    pub fn request_transform(&mut self, requester: ClientId) -> bool {
        if !self.enabled || !self.session.is_server() {
            return false;
        }

        let payload = if self.is_owner() {
            let now = self.session.now();
            self.current_sample(now).encode().to_vec()
        } else if let Some(validated) = &self.last_validated {
            validated.payload.clone()
        } else {
            log::debug!(
                "object {}: nothing to answer request from {}",
                self.object_id,
                requester
            );
            return false;
        };

        let message = RpcMessage::new(
            self.object_id,
            RpcKind::ApplyTransform,
            self.session.local_client_id(),
            payload,
        );
        if let Err(e) = self.channel.send_to_client(requester, message) {
            log::warn!("object {}: request answer failed: {}", self.object_id, e);
            self.stats.send_failures += 1;
            return false;
        }
        self.stats.requests_served += 1;
        self.push_event(SyncEvent::RequestServed {
            object_id: self.object_id,
            requester,
        });
        true
    }

    /// Moves the rendered pose toward the buffered samples. Owners and
    /// non-interpolating endpoints do nothing.
    pub fn render_tick(&mut self, local_time: f32) {
        if self.is_owner() || !self.enabled || !self.interpolation_active() {
            return;
        }

        let platforms = self.session.platforms();
        let render_time = local_time - self.latency.average() - self.config.interp_delay;
        let rate = self.config.send_rate;

        let position = self.position_buffer.interpolate_toward(
            render_time,
            self.position,
            rate,
            platforms.as_ref(),
            lerp_vec3,
        );
        let correction = self.position.distance(position);
        if correction > self.config.correction_warn_distance {
            log::warn!(
                "object {}: large correction of {:.2} units",
                self.object_id,
                correction
            );
            self.stats.large_corrections += 1;
            self.push_event(SyncEvent::LargeCorrection {
                object_id: self.object_id,
                distance: correction,
            });
        }
        self.position = position;

        self.rotation = self.rotation_buffer.interpolate_toward(
            render_time,
            self.rotation,
            rate,
            platforms.as_ref(),
            slerp_quat,
        );
    }

    /// Discontinuous moves need an explicit re-synchronization that this
    /// component does not provide.
    pub fn teleport(&mut self, position: Vec3, rotation: Quat) -> Result<(), SyncError> {
        log::warn!(
            "object {}: teleport to {} / {} requested; re-synchronize explicitly",
            self.object_id,
            position,
            rotation
        );
        Err(SyncError::TeleportUnsupported)
    }

    fn interpolation_active(&self) -> bool {
        self.config.interpolate && (!self.session.is_server() || self.config.interpolate_server)
    }

    fn decode(&mut self, payload: &[u8], sender: ClientId) -> Option<TransformSample> {
        match TransformSample::decode(payload) {
            Ok(sample) => Some(sample),
            Err(error) => {
                log::warn!(
                    "object {}: malformed sample from {}: {}",
                    self.object_id,
                    sender,
                    error
                );
                self.stats.malformed += 1;
                self.push_event(SyncEvent::MalformedPayload {
                    object_id: self.object_id,
                    sender,
                    error,
                });
                None
            }
        }
    }

    fn accept_sample(&mut self, sample: TransformSample) {
        let now = self.session.now();

        if let Some(previous) = self.last_received {
            if sample.timestamp < previous.timestamp {
                log::warn!(
                    "object {}: out of order sample {} after {}",
                    self.object_id,
                    sample.timestamp,
                    previous.timestamp
                );
                self.stats.out_of_order += 1;
                self.push_event(SyncEvent::OutOfOrderSample {
                    object_id: self.object_id,
                    timestamp: sample.timestamp,
                    previous: previous.timestamp,
                });
            }
            self.update_velocity(&previous, &sample);
        }

        self.latency.accumulate(now - sample.timestamp);

        if self.interpolation_active() {
            self.position_buffer
                .insert(sample.timestamp, sample.position, Some(sample.parent));
            self.rotation_buffer
                .insert(sample.timestamp, sample.rotation, None);
        } else {
            self.position = self.session.resolver().to_world(sample.position, sample.parent);
            self.rotation = sample.rotation;
        }
        self.parent = sample.parent;

        self.last_received = Some(sample);
        self.stats.samples_received += 1;
    }

    fn update_velocity(&mut self, previous: &TransformSample, sample: &TransformSample) {
        let dt = sample.timestamp - previous.timestamp;
        let delta = if sample.parent.as_option() == previous.parent.as_option() {
            sample.position - previous.position
        } else {
            let resolver: FrameResolver<'_> = self.session.resolver();
            resolver.to_world(sample.position, sample.parent)
                - resolver.to_world(previous.position, previous.parent)
        };
        let velocity = delta / dt;
        if velocity.is_finite() {
            self.velocity = velocity;
        }
    }

    fn push_event(&mut self, event: SyncEvent) {
        if self.pending_events.len() >= MAX_PENDING_EVENTS {
            self.pending_events.pop_front();
        }
        self.pending_events.push_back(event);
    }
}

impl<C: RpcChannel> Tickable for NetworkedTransform<C> {
    fn tick(&mut self, now: f32) {
        if self.is_owner() {
            self.transmit_at(now);
        } else {
            self.render_tick(now);
        }
    }
}

impl<C> std::fmt::Debug for NetworkedTransform<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkedTransform")
            .field("object_id", &self.object_id)
            .field("owner_client_id", &self.owner_client_id)
            .field("role", &self.role)
            .field("position", &self.position)
            .field("rotation", &self.rotation)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::frame::{NoPlatforms, PlatformMap};
    use crate::net::{Recipient, RecordingChannel};
    use crate::session::{ManualClock, NetworkClock};
    use crate::sync::EndpointFlags;

    fn session(
        local: ClientId,
        flags: EndpointFlags,
    ) -> (Rc<ManualClock>, SessionContext) {
        let clock = Rc::new(ManualClock::default());
        let session = SessionContext::start(
            local,
            flags,
            clock.clone() as Rc<dyn NetworkClock>,
            Rc::new(NoPlatforms),
        );
        (clock, session)
    }

    fn encoded(timestamp: f32, position: Vec3) -> Vec<u8> {
        TransformSample::new(timestamp, position, Quat::IDENTITY, ParentRef::NONE)
            .encode()
            .to_vec()
    }

    #[test]
    fn owner_suppresses_unchanged_pose() {
        let (clock, session) = session(1, EndpointFlags::CLIENT);
        let mut transform =
            NetworkedTransform::new(5, 1, session, SyncConfig::default(), RecordingChannel::new());
        transform.network_start();
        assert!(transform.channel().sent.is_empty());

        let mut sends = Vec::new();
        for step in 1..=40 {
            // 62.5 ms steps keep clock arithmetic exact.
            let now = step as f32 * 0.0625;
            clock.set(now);
            if step == 2 {
                transform.set_position(Vec3::X);
            }
            if step == 30 {
                transform.set_position(Vec3::Y);
            }
            if transform.transmit_if_owner() {
                sends.push(step);
            }
        }

        // Step 2 changes the pose; 0.5 s later (step 10) the owner goes quiet.
        assert_eq!(sends[..9], [1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(!sends.contains(&10));
        assert!(!sends.contains(&29));
        assert!(sends.contains(&30));
        assert_eq!(transform.stats().samples_sent, sends.len() as u64);
        assert!(transform.stats().suppressed_ticks > 0);

        let sent = transform.channel_mut().take();
        assert!(sent
            .iter()
            .all(|(to, m)| *to == Recipient::Server && m.kind == RpcKind::SubmitTransform));
    }

    #[test]
    fn owner_rate_limits_to_send_rate() {
        let (clock, session) = session(1, EndpointFlags::CLIENT);
        let mut transform =
            NetworkedTransform::new(5, 1, session, SyncConfig::default(), RecordingChannel::new());
        transform.network_start();

        clock.set(0.03125);
        assert!(!transform.transmit_if_owner());
        clock.set(0.0625);
        assert!(transform.transmit_if_owner());
        clock.set(0.09375);
        assert!(!transform.transmit_if_owner());
    }

    #[test]
    fn server_owned_object_broadcasts() {
        let (clock, session) = session(SERVER_CLIENT_ID, EndpointFlags::SERVER);
        let mut transform = NetworkedTransform::new(
            8,
            SERVER_CLIENT_ID,
            session,
            SyncConfig::default(),
            RecordingChannel::new(),
        );
        transform.network_start();
        clock.set(0.0625);
        assert!(transform.transmit_if_owner());

        let sent = transform.channel_mut().take();
        assert_eq!(sent[0].0, Recipient::AllExcept(SERVER_CLIENT_ID));
        assert_eq!(sent[0].1.kind, RpcKind::ApplyTransform);
    }

    #[test]
    fn disabled_or_disconnected_owner_is_silent() {
        let (clock, session) = session(1, EndpointFlags::CLIENT);
        let mut transform = NetworkedTransform::new(
            5,
            1,
            session.clone(),
            SyncConfig::default(),
            RecordingChannel::new(),
        );
        transform.network_start();
        clock.set(1.0);

        transform.set_enabled(false);
        assert!(!transform.transmit_if_owner());
        transform.set_enabled(true);
        session.disconnect();
        assert!(!transform.transmit_if_owner());
    }

    #[test]
    fn observer_requests_on_join() {
        let (_, session) = session(2, EndpointFlags::CLIENT);
        let mut transform =
            NetworkedTransform::new(5, 1, session, SyncConfig::default(), RecordingChannel::new());
        transform.network_start();

        let sent = transform.channel_mut().take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Recipient::Server);
        assert_eq!(sent[0].1, RpcMessage::request(5, 2));
    }

    #[test]
    fn observer_velocity_and_render() {
        let (clock, session) = session(2, EndpointFlags::CLIENT);
        let config = SyncConfig {
            interp_delay: 0.0,
            ..Default::default()
        };
        let mut transform =
            NetworkedTransform::new(5, 1, session, config, RecordingChannel::new());

        clock.set(0.0);
        assert!(transform.receive_sample(&encoded(0.0, Vec3::ZERO), SERVER_CLIENT_ID));
        clock.set(1.0);
        assert!(transform.receive_sample(&encoded(1.0, Vec3::new(10.0, 0.0, 0.0)), SERVER_CLIENT_ID));

        assert!((transform.velocity() - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
        assert_eq!(transform.latency(), 0.0);

        transform.render_tick(0.5);
        assert!((transform.position() - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn zero_dt_keeps_previous_velocity() {
        let (_, session) = session(2, EndpointFlags::CLIENT);
        let mut transform =
            NetworkedTransform::new(5, 1, session, SyncConfig::default(), RecordingChannel::new());

        transform.receive_sample(&encoded(0.0, Vec3::ZERO), 0);
        transform.receive_sample(&encoded(1.0, Vec3::X), 0);
        transform.receive_sample(&encoded(1.0, Vec3::Y), 0);
        assert_eq!(transform.velocity(), Vec3::X);
    }

    #[test]
    fn without_interpolation_pose_snaps() {
        let (_, session) = session(2, EndpointFlags::CLIENT);
        let config = SyncConfig {
            interpolate: false,
            ..Default::default()
        };
        let mut transform =
            NetworkedTransform::new(5, 1, session, config, RecordingChannel::new());
        assert!(!transform.config().interpolate_server);

        transform.receive_sample(&encoded(0.0, Vec3::new(3.0, 2.0, 1.0)), 0);
        assert_eq!(transform.position(), Vec3::new(3.0, 2.0, 1.0));
        assert_eq!(transform.buffered_samples(), 0);
    }

    #[test]
    fn malformed_payload_is_reported() {
        let (_, session) = session(2, EndpointFlags::CLIENT);
        let mut transform =
            NetworkedTransform::new(5, 1, session, SyncConfig::default(), RecordingChannel::new());

        assert!(!transform.receive_sample(&[1, 2], 0));
        assert_eq!(transform.stats().malformed, 1);
        let events = transform.drain_events();
        assert!(matches!(
            events.as_slice(),
            [SyncEvent::MalformedPayload { object_id: 5, .. }]
        ));
    }

    #[test]
    fn authority_validates_and_relays() {
        let (_, session) = session(SERVER_CLIENT_ID, EndpointFlags::SERVER);
        let mut transform = NetworkedTransform::new(
            5,
            3,
            session,
            SyncConfig::default(),
            RecordingChannel::new(),
        )
        .with_validator(|from, to| from.distance(to) < 5.0);

        assert!(transform.submit_sample(&encoded(0.0, Vec3::new(1.0, 0.0, 0.0)), 3));
        assert!(!transform.submit_sample(&encoded(0.05, Vec3::new(50.0, 0.0, 0.0)), 3));
        assert!(transform.submit_sample(&encoded(0.1, Vec3::new(2.0, 0.0, 0.0)), 3));

        let sent = transform.channel_mut().take();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(to, _)| *to == Recipient::AllExcept(3)));
        assert_eq!(transform.stats().rejected, 1);

        let events = transform.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SyncEvent::MoveRejected { sender: 3, to, .. } if to.x == 50.0
        )));
    }

    #[test]
    fn authority_ignores_foreign_submit() {
        let (_, session) = session(SERVER_CLIENT_ID, EndpointFlags::SERVER);
        let mut transform = NetworkedTransform::new(
            5,
            3,
            session,
            SyncConfig::default(),
            RecordingChannel::new(),
        );

        assert!(!transform.submit_sample(&encoded(0.0, Vec3::ONE), 4));
        assert!(transform.channel().sent.is_empty());
    }

    #[test]
    fn authority_ignores_apply_from_clients() {
        let (_, session) = session(SERVER_CLIENT_ID, EndpointFlags::SERVER);
        let config = SyncConfig {
            interpolate: false,
            ..Default::default()
        };
        let mut transform =
            NetworkedTransform::new(5, 3, session, config, RecordingChannel::new())
                .with_validator(|from, to| from.distance(to) < 5.0);

        assert!(transform.submit_sample(&encoded(0.0, Vec3::new(1.0, 0.0, 0.0)), 3));
        transform.channel_mut().take();
        transform.drain_events();

        let far = encoded(0.1, Vec3::new(500.0, 0.0, 0.0));
        assert!(!transform.submit_sample(&far, 3));
        assert!(!transform.handle_rpc(&RpcMessage::new(5, RpcKind::ApplyTransform, 3, far)));

        assert_eq!(transform.position(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(transform.stats().rejected, 2);
        assert_eq!(transform.stats().samples_received, 1);
        assert!(transform.channel().sent.is_empty());
        let events = transform.drain_events();
        assert!(events.contains(&SyncEvent::ForeignApply {
            object_id: 5,
            sender: 3,
        }));
    }

    #[test]
    fn observer_applies_only_server_samples() {
        let (_, session) = session(2, EndpointFlags::CLIENT);
        let config = SyncConfig {
            interpolate: false,
            ..Default::default()
        };
        let mut transform =
            NetworkedTransform::new(5, 1, session, config, RecordingChannel::new());

        let spoofed = RpcMessage::new(5, RpcKind::ApplyTransform, 4, encoded(0.0, Vec3::ONE));
        assert!(!transform.handle_rpc(&spoofed));
        assert_eq!(transform.position(), Vec3::ZERO);
        assert!(matches!(
            transform.drain_events().as_slice(),
            [SyncEvent::ForeignApply { sender: 4, .. }]
        ));

        let relayed = RpcMessage::new(
            5,
            RpcKind::ApplyTransform,
            SERVER_CLIENT_ID,
            encoded(0.0, Vec3::ONE),
        );
        assert!(transform.handle_rpc(&relayed));
        assert_eq!(transform.position(), Vec3::ONE);
    }

    #[test]
    fn owner_pose_ignores_incoming_samples() {
        let (_, session) = session(1, EndpointFlags::CLIENT);
        let config = SyncConfig {
            interpolate: false,
            ..Default::default()
        };
        let mut transform =
            NetworkedTransform::new(5, 1, session, config, RecordingChannel::new());
        transform.set_position(Vec3::new(2.0, 0.0, 0.0));

        let far = encoded(0.0, Vec3::new(90.0, 0.0, 0.0));
        assert!(!transform.receive_sample(&far, SERVER_CLIENT_ID));
        assert!(!transform.handle_rpc(&RpcMessage::new(
            5,
            RpcKind::ApplyTransform,
            SERVER_CLIENT_ID,
            far,
        )));
        assert_eq!(transform.position(), Vec3::new(2.0, 0.0, 0.0));
        assert!(transform.last_received().is_none());
    }

    #[test]
    fn server_without_server_interpolation_snaps() {
        let (clock, session) = session(SERVER_CLIENT_ID, EndpointFlags::SERVER);
        let config = SyncConfig {
            interpolate: true,
            interpolate_server: false,
            ..Default::default()
        };
        let mut transform =
            NetworkedTransform::new(5, 3, session, config, RecordingChannel::new());

        clock.set(0.0);
        assert!(transform.submit_sample(&encoded(0.0, Vec3::new(1.0, 0.0, 0.0)), 3));
        clock.set(0.0625);
        assert!(transform.submit_sample(&encoded(0.0625, Vec3::new(3.0, 1.0, 0.0)), 3));

        assert_eq!(transform.position(), Vec3::new(3.0, 1.0, 0.0));
        assert_eq!(transform.buffered_samples(), 0);

        transform.render_tick(0.0);
        transform.render_tick(5.0);
        assert_eq!(transform.position(), Vec3::new(3.0, 1.0, 0.0));
        assert!(transform.drain_events().is_empty());
    }

    #[test]
    fn request_served_from_last_validated_bytes() {
        let (_, session) = session(SERVER_CLIENT_ID, EndpointFlags::SERVER);
        let mut transform = NetworkedTransform::new(
            5,
            3,
            session,
            SyncConfig::default(),
            RecordingChannel::new(),
        );
        assert!(!transform.request_transform(7));

        let payload = encoded(0.0, Vec3::new(4.0, 0.0, 0.0));
        transform.submit_sample(&payload, 3);
        transform.channel_mut().take();

        assert!(transform.request_transform(7));
        let sent = transform.channel_mut().take();
        assert_eq!(sent[0].0, Recipient::Client(7));
        assert_eq!(sent[0].1.payload, payload);
    }

    #[test]
    fn owner_sends_relative_position_on_platform() {
        let clock = Rc::new(ManualClock::default());
        let platforms = Rc::new(RefCell::new(PlatformMap::new()));
        let deck = ParentRef::new(9, 0);
        platforms
            .borrow_mut()
            .place(deck, Vec3::new(100.0, 0.0, 0.0), Quat::IDENTITY);
        let session = SessionContext::start(
            1,
            EndpointFlags::CLIENT,
            clock.clone(),
            platforms.clone(),
        );

        let mut transform =
            NetworkedTransform::new(5, 1, session, SyncConfig::default(), RecordingChannel::new());
        transform.network_start();
        transform.set_position(Vec3::new(101.0, 0.0, 0.0));
        transform.set_parent(deck);
        clock.set(0.0625);
        assert!(transform.transmit_if_owner());

        let sent = transform.channel_mut().take();
        let sample = TransformSample::decode(&sent[0].1.payload).unwrap();
        assert_eq!(sample.parent, deck);
        assert_eq!(sample.position, Vec3::new(1.0, 0.0, 0.0));

        // A platform that vanished is not referenced.
        platforms.borrow_mut().remove(deck);
        transform.set_position(Vec3::new(50.0, 0.0, 0.0));
        clock.set(0.125);
        assert!(transform.transmit_if_owner());
        let sent = transform.channel_mut().take();
        let sample = TransformSample::decode(&sent[0].1.payload).unwrap();
        assert!(sample.parent.is_none());
        assert_eq!(sample.position, Vec3::new(50.0, 0.0, 0.0));
    }

    #[test]
    fn teleport_is_unsupported() {
        let (_, session) = session(1, EndpointFlags::CLIENT);
        let mut transform =
            NetworkedTransform::new(5, 1, session, SyncConfig::default(), RecordingChannel::new());
        assert_eq!(
            transform.teleport(Vec3::ONE, Quat::IDENTITY),
            Err(SyncError::TeleportUnsupported)
        );
    }
}
