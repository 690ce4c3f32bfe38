use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use super::events::SyncEvent;
use super::transform::NetworkedTransform;
use crate::net::{ObjectId, RpcChannel, RpcMessage};
use crate::schedule::Tickable;

/// Every synchronized object on one endpoint, keyed by object id.
pub struct TransformTable<C> {
    objects: BTreeMap<ObjectId, NetworkedTransform<C>>,
}

impl<C> Default for TransformTable<C> {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
        }
    }
}

impl<C: RpcChannel> TransformTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object and starts it on the network. An object already
    /// registered under the same id is kept and the new one is returned.
    pub fn spawn(
        &mut self,
        mut transform: NetworkedTransform<C>,
    ) -> Result<(), NetworkedTransform<C>> {
        match self.objects.entry(transform.object_id()) {
            Entry::Occupied(_) => Err(transform),
            Entry::Vacant(slot) => {
                log::debug!(
                    "spawned object {} owned by {} ({:?})",
                    transform.object_id(),
                    transform.owner_client_id(),
                    transform.role()
                );
                transform.network_start();
                slot.insert(transform);
                Ok(())
            }
        }
    }

    pub fn despawn(&mut self, object_id: ObjectId) -> Option<NetworkedTransform<C>> {
        let removed = self.objects.remove(&object_id);
        if removed.is_some() {
            log::debug!("despawned object {}", object_id);
        }
        removed
    }

    pub fn get(&self, object_id: ObjectId) -> Option<&NetworkedTransform<C>> {
        self.objects.get(&object_id)
    }

    pub fn get_mut(&mut self, object_id: ObjectId) -> Option<&mut NetworkedTransform<C>> {
        self.objects.get_mut(&object_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkedTransform<C>> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Routes one incoming RPC to its object. Unknown ids are dropped.
    pub fn dispatch(&mut self, message: &RpcMessage) -> bool {
        match self.objects.get_mut(&message.object_id) {
            Some(transform) => transform.handle_rpc(message),
            None => {
                log::debug!(
                    "{:?} for unknown object {} from {}",
                    message.kind,
                    message.object_id,
                    message.origin
                );
                false
            }
        }
    }

    pub fn dispatch_all(&mut self, messages: impl IntoIterator<Item = RpcMessage>) -> usize {
        messages
            .into_iter()
            .filter(|message| self.dispatch(message))
            .count()
    }

    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        self.objects
            .values_mut()
            .flat_map(|transform| transform.drain_events())
            .collect()
    }
}

impl<C: RpcChannel> Tickable for TransformTable<C> {
    fn tick(&mut self, now: f32) {
        for transform in self.objects.values_mut() {
            transform.tick(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::frame::ParentRef;
    use crate::net::{RecordingChannel, RpcKind, SERVER_CLIENT_ID, TransformSample};
    use crate::session::{ManualClock, SessionContext};
    use crate::sync::{EndpointFlags, SyncConfig};

    fn client_table() -> (SessionContext, TransformTable<RecordingChannel>) {
        let session = SessionContext::without_platforms(
            2,
            EndpointFlags::CLIENT,
            Rc::new(ManualClock::default()),
        );
        (session, TransformTable::new())
    }

    #[test]
    fn spawn_starts_and_rejects_duplicates() {
        let (session, mut table) = client_table();
        let observer = NetworkedTransform::new(
            1,
            SERVER_CLIENT_ID,
            session.clone(),
            SyncConfig::default(),
            RecordingChannel::new(),
        );
        assert!(table.spawn(observer).is_ok());
        assert_eq!(table.get(1).unwrap().channel().sent.len(), 1);

        let duplicate = NetworkedTransform::new(
            1,
            2,
            session,
            SyncConfig::default(),
            RecordingChannel::new(),
        );
        assert!(table.spawn(duplicate).is_err());
        assert_eq!(table.len(), 1);
        assert!(table.despawn(1).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn dispatch_routes_by_object_id() {
        let (session, mut table) = client_table();
        for id in [1, 2] {
            let transform = NetworkedTransform::new(
                id,
                SERVER_CLIENT_ID,
                session.clone(),
                SyncConfig::default(),
                RecordingChannel::new(),
            );
            table.spawn(transform).ok();
        }

        let payload = TransformSample::new(0.0, Vec3::ONE, glam::Quat::IDENTITY, ParentRef::NONE)
            .encode()
            .to_vec();
        let messages = vec![
            RpcMessage::new(2, RpcKind::ApplyTransform, SERVER_CLIENT_ID, payload.clone()),
            RpcMessage::new(9, RpcKind::ApplyTransform, SERVER_CLIENT_ID, payload),
        ];
        assert_eq!(table.dispatch_all(messages), 1);
        assert!(table.get(1).unwrap().last_received().is_none());
        assert!(table.get(2).unwrap().last_received().is_some());
    }
}
