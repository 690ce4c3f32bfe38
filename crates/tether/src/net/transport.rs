use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

use super::protocol::{ClientId, PacketError, RpcMessage, SERVER_CLIENT_ID};
use super::simulator::NetworkSimulator;
use super::stats::{NetworkStats, PacketLossSimulation};
use crate::session::NetworkClock;

/// The four delivery patterns the sync protocol needs from a transport.
/// Delivery is unreliable and unordered.
pub trait RpcChannel {
    fn send_to_server(&mut self, message: RpcMessage) -> Result<(), PacketError>;

    fn send_to_client(&mut self, client_id: ClientId, message: RpcMessage)
    -> Result<(), PacketError>;

    /// Every connected client except `excluded`.
    fn send_to_all_except(
        &mut self,
        excluded: ClientId,
        message: RpcMessage,
    ) -> Result<(), PacketError>;

    fn send_to_all(&mut self, message: RpcMessage) -> Result<(), PacketError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Server,
    Client(ClientId),
    AllExcept(ClientId),
    All,
}

/// Channel that only records what it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    pub sent: Vec<(Recipient, RpcMessage)>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<(Recipient, RpcMessage)> {
        std::mem::take(&mut self.sent)
    }
}

impl RpcChannel for RecordingChannel {
    fn send_to_server(&mut self, message: RpcMessage) -> Result<(), PacketError> {
        self.sent.push((Recipient::Server, message));
        Ok(())
    }

    fn send_to_client(
        &mut self,
        client_id: ClientId,
        message: RpcMessage,
    ) -> Result<(), PacketError> {
        self.sent.push((Recipient::Client(client_id), message));
        Ok(())
    }

    fn send_to_all_except(
        &mut self,
        excluded: ClientId,
        message: RpcMessage,
    ) -> Result<(), PacketError> {
        self.sent.push((Recipient::AllExcept(excluded), message));
        Ok(())
    }

    fn send_to_all(&mut self, message: RpcMessage) -> Result<(), PacketError> {
        self.sent.push((Recipient::All, message));
        Ok(())
    }
}

struct HubState {
    clock: Rc<dyn NetworkClock>,
    endpoints: BTreeSet<ClientId>,
    simulator: NetworkSimulator,
    inboxes: HashMap<ClientId, VecDeque<RpcMessage>>,
}

/// In-process network joining one server and any number of clients. Every
/// envelope is serialized, pushed through a [`NetworkSimulator`] and
/// decoded again on delivery.
#[derive(Clone)]
pub struct LoopbackHub {
    state: Rc<RefCell<HubState>>,
}

impl LoopbackHub {
    pub fn new(clock: Rc<dyn NetworkClock>, conditions: PacketLossSimulation, seed: u64) -> Self {
        Self::with_simulator(clock, NetworkSimulator::new(conditions, seed))
    }

    pub fn with_simulator(clock: Rc<dyn NetworkClock>, simulator: NetworkSimulator) -> Self {
        Self {
            state: Rc::new(RefCell::new(HubState {
                clock,
                endpoints: BTreeSet::new(),
                simulator,
                inboxes: HashMap::new(),
            })),
        }
    }

    pub fn connect(&self, client_id: ClientId) -> LoopbackPort {
        let mut state = self.state.borrow_mut();
        if state.endpoints.insert(client_id) {
            log::debug!("client {} connected to loopback hub", client_id);
        }
        state.inboxes.entry(client_id).or_default();
        LoopbackPort {
            local_id: client_id,
            hub: self.clone(),
        }
    }

    pub fn disconnect(&self, client_id: ClientId) {
        let mut state = self.state.borrow_mut();
        if state.endpoints.remove(&client_id) {
            log::debug!("client {} left loopback hub", client_id);
        }
        state.inboxes.remove(&client_id);
        state.simulator.discard_for(client_id);
    }

    pub fn is_connected(&self, client_id: ClientId) -> bool {
        self.state.borrow().endpoints.contains(&client_id)
    }

    /// Moves every datagram whose delay has elapsed into its inbox.
    pub fn pump(&self) {
        let mut state = self.state.borrow_mut();
        let now = state.clock.now();
        for (recipient, data) in state.simulator.take_released(now) {
            let message = match RpcMessage::deserialize(&data) {
                Ok(message) => message,
                Err(e) => {
                    log::warn!("dropping malformed envelope for {}: {}", recipient, e);
                    state.simulator.stats_mut().packets_malformed += 1;
                    continue;
                }
            };
            if let Some(inbox) = state.inboxes.get_mut(&recipient) {
                inbox.push_back(message);
            }
        }
    }

    /// Raw bytes onto the wire toward one endpoint.
    pub fn inject(&self, recipient: ClientId, data: Vec<u8>) {
        let mut state = self.state.borrow_mut();
        let now = state.clock.now();
        state.simulator.enqueue(now, recipient, data);
    }

    pub fn drain(&self, client_id: ClientId) -> Vec<RpcMessage> {
        self.state
            .borrow_mut()
            .inboxes
            .get_mut(&client_id)
            .map(|inbox| inbox.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn in_flight(&self) -> usize {
        self.state.borrow().simulator.in_flight()
    }

    pub fn stats(&self) -> NetworkStats {
        self.state.borrow().simulator.stats().clone()
    }

    fn route(
        &self,
        sender: ClientId,
        recipient: Recipient,
        message: &RpcMessage,
    ) -> Result<(), PacketError> {
        let data = message.serialize()?;
        let mut state = self.state.borrow_mut();
        let targets: Vec<ClientId> = match recipient {
            Recipient::Server => vec![SERVER_CLIENT_ID],
            Recipient::Client(id) => vec![id],
            Recipient::AllExcept(excluded) => state
                .endpoints
                .iter()
                .copied()
                .filter(|&id| id != SERVER_CLIENT_ID && id != excluded && id != sender)
                .collect(),
            Recipient::All => state
                .endpoints
                .iter()
                .copied()
                .filter(|&id| id != SERVER_CLIENT_ID && id != sender)
                .collect(),
        };

        let now = state.clock.now();
        for target in targets {
            if !state.endpoints.contains(&target) {
                log::debug!("no endpoint {} for {:?}", target, message.kind);
                continue;
            }
            state.simulator.enqueue(now, target, data.clone());
        }
        Ok(())
    }
}

/// One endpoint's handle on a [`LoopbackHub`].
#[derive(Clone)]
pub struct LoopbackPort {
    local_id: ClientId,
    hub: LoopbackHub,
}

impl LoopbackPort {
    pub fn local_id(&self) -> ClientId {
        self.local_id
    }

    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }

    pub fn drain(&self) -> Vec<RpcMessage> {
        self.hub.drain(self.local_id)
    }
}

impl RpcChannel for LoopbackPort {
    fn send_to_server(&mut self, message: RpcMessage) -> Result<(), PacketError> {
        self.hub.route(self.local_id, Recipient::Server, &message)
    }

    fn send_to_client(
        &mut self,
        client_id: ClientId,
        message: RpcMessage,
    ) -> Result<(), PacketError> {
        self.hub
            .route(self.local_id, Recipient::Client(client_id), &message)
    }

    fn send_to_all_except(
        &mut self,
        excluded: ClientId,
        message: RpcMessage,
    ) -> Result<(), PacketError> {
        self.hub
            .route(self.local_id, Recipient::AllExcept(excluded), &message)
    }

    fn send_to_all(&mut self, message: RpcMessage) -> Result<(), PacketError> {
        self.hub.route(self.local_id, Recipient::All, &message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::RpcKind;
    use crate::session::ManualClock;

    fn hub() -> (Rc<ManualClock>, LoopbackHub) {
        let clock = Rc::new(ManualClock::default());
        let hub = LoopbackHub::new(clock.clone(), PacketLossSimulation::default(), 0);
        (clock, hub)
    }

    fn apply(payload: u8) -> RpcMessage {
        RpcMessage::new(1, RpcKind::ApplyTransform, SERVER_CLIENT_ID, vec![payload])
    }

    #[test]
    fn broadcast_skips_excluded_and_server() {
        let (_, hub) = hub();
        let mut server = hub.connect(SERVER_CLIENT_ID);
        let a = hub.connect(1);
        let b = hub.connect(2);
        let c = hub.connect(3);

        server.send_to_all_except(2, apply(7)).unwrap();
        hub.pump();

        assert_eq!(a.drain().len(), 1);
        assert!(b.drain().is_empty());
        assert_eq!(c.drain()[0].payload, vec![7]);
        assert!(server.drain().is_empty());
    }

    #[test]
    fn client_to_server_and_back() {
        let (_, hub) = hub();
        let mut server = hub.connect(SERVER_CLIENT_ID);
        let mut client = hub.connect(5);

        client
            .send_to_server(RpcMessage::request(9, client.local_id()))
            .unwrap();
        hub.pump();
        let received = server.drain();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, RpcKind::RequestTransform);
        assert_eq!(received[0].origin, 5);

        server.send_to_client(5, apply(1)).unwrap();
        server.send_to_all(apply(2)).unwrap();
        hub.pump();
        assert_eq!(client.drain().len(), 2);
    }

    #[test]
    fn delayed_delivery_follows_clock() {
        let clock = Rc::new(ManualClock::default());
        let conditions = PacketLossSimulation {
            enabled: true,
            min_latency_ms: 100,
            max_latency_ms: 100,
            ..Default::default()
        };
        let hub = LoopbackHub::new(clock.clone(), conditions, 0);
        let mut server = hub.connect(SERVER_CLIENT_ID);
        let client = hub.connect(1);

        server.send_to_all(apply(3)).unwrap();
        hub.pump();
        assert!(client.drain().is_empty());

        clock.advance(0.1);
        hub.pump();
        assert_eq!(client.drain().len(), 1);
    }

    #[test]
    fn malformed_envelope_is_dropped() {
        let (_, hub) = hub();
        let client = hub.connect(1);
        hub.inject(1, vec![0xde, 0xad]);
        hub.pump();

        assert!(client.drain().is_empty());
        assert_eq!(hub.stats().packets_malformed, 1);
    }

    #[test]
    fn disconnected_client_receives_nothing() {
        let (_, hub) = hub();
        let mut server = hub.connect(SERVER_CLIENT_ID);
        hub.connect(1);
        hub.disconnect(1);

        server.send_to_client(1, apply(1)).unwrap();
        hub.pump();
        assert!(hub.drain(1).is_empty());
        assert!(!hub.is_connected(1));
    }
}
