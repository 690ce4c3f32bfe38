use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use crate::frame::{FrameResolver, NoPlatforms, PlatformRegistry};
use crate::net::{ClientId, SERVER_CLIENT_ID};
use crate::sync::EndpointFlags;

/// Shared network time in seconds. Every endpoint reads the same timeline.
pub trait NetworkClock {
    fn now(&self) -> f32;
}

/// Clock advanced explicitly by the frame loop or a test.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f32>,
}

impl ManualClock {
    pub fn new(start: f32) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, now: f32) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: f32) {
        self.now.set(self.now.get() + delta);
    }
}

impl NetworkClock for ManualClock {
    fn now(&self) -> f32 {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClock for SystemClock {
    fn now(&self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

struct SessionState {
    local_client_id: ClientId,
    flags: EndpointFlags,
    clock: Rc<dyn NetworkClock>,
    platforms: Rc<dyn PlatformRegistry>,
    connected: Cell<bool>,
}

/// One endpoint's view of the networking session. Created when the
/// endpoint starts, shared by every networked object on it, and torn down
/// with [`disconnect`](Self::disconnect).
#[derive(Clone)]
pub struct SessionContext {
    state: Rc<SessionState>,
}

impl SessionContext {
    pub fn start(
        local_client_id: ClientId,
        flags: EndpointFlags,
        clock: Rc<dyn NetworkClock>,
        platforms: Rc<dyn PlatformRegistry>,
    ) -> Self {
        log::debug!(
            "session started for client {} as {:?}",
            local_client_id,
            flags
        );
        Self {
            state: Rc::new(SessionState {
                local_client_id,
                flags,
                clock,
                platforms,
                connected: Cell::new(true),
            }),
        }
    }

    pub fn server(clock: Rc<dyn NetworkClock>, platforms: Rc<dyn PlatformRegistry>) -> Self {
        Self::start(SERVER_CLIENT_ID, EndpointFlags::SERVER, clock, platforms)
    }

    pub fn host(clock: Rc<dyn NetworkClock>, platforms: Rc<dyn PlatformRegistry>) -> Self {
        Self::start(SERVER_CLIENT_ID, EndpointFlags::HOST, clock, platforms)
    }

    pub fn client(
        local_client_id: ClientId,
        clock: Rc<dyn NetworkClock>,
        platforms: Rc<dyn PlatformRegistry>,
    ) -> Self {
        Self::start(local_client_id, EndpointFlags::CLIENT, clock, platforms)
    }

    /// Session with no moving platforms.
    pub fn without_platforms(
        local_client_id: ClientId,
        flags: EndpointFlags,
        clock: Rc<dyn NetworkClock>,
    ) -> Self {
        Self::start(local_client_id, flags, clock, Rc::new(NoPlatforms))
    }

    pub fn local_client_id(&self) -> ClientId {
        self.state.local_client_id
    }

    pub fn flags(&self) -> EndpointFlags {
        self.state.flags
    }

    pub fn is_server(&self) -> bool {
        self.state.flags.contains(EndpointFlags::SERVER)
    }

    pub fn is_client(&self) -> bool {
        self.state.flags.contains(EndpointFlags::CLIENT)
    }

    pub fn now(&self) -> f32 {
        self.state.clock.now()
    }

    pub fn clock(&self) -> Rc<dyn NetworkClock> {
        Rc::clone(&self.state.clock)
    }

    pub fn platforms(&self) -> Rc<dyn PlatformRegistry> {
        Rc::clone(&self.state.platforms)
    }

    pub fn resolver(&self) -> FrameResolver<'_> {
        FrameResolver::new(self.state.platforms.as_ref())
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.get()
    }

    pub fn disconnect(&self) {
        if self.state.connected.replace(false) {
            log::debug!("session for client {} disconnected", self.local_client_id());
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("local_client_id", &self.state.local_client_id)
            .field("flags", &self.state.flags)
            .field("connected", &self.state.connected.get())
            .finish()
    }
}
