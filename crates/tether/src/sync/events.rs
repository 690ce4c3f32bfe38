use glam::Vec3;

use crate::net::{ClientId, ObjectId, WireError};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    OutOfOrderSample {
        object_id: ObjectId,
        timestamp: f32,
        previous: f32,
    },
    LargeCorrection {
        object_id: ObjectId,
        distance: f32,
    },
    MoveRejected {
        object_id: ObjectId,
        sender: ClientId,
        from: Vec3,
        to: Vec3,
    },
    /// A submit from a client that does not own the object.
    ForeignSubmit {
        object_id: ObjectId,
        sender: ClientId,
    },
    /// An applied sample that did not come from the server, or that
    /// reached the server itself.
    ForeignApply {
        object_id: ObjectId,
        sender: ClientId,
    },
    MalformedPayload {
        object_id: ObjectId,
        sender: ClientId,
        error: WireError,
    },
    RequestServed {
        object_id: ObjectId,
        requester: ClientId,
    },
}

impl SyncEvent {
    pub fn object_id(&self) -> ObjectId {
        match self {
            SyncEvent::OutOfOrderSample { object_id, .. }
            | SyncEvent::LargeCorrection { object_id, .. }
            | SyncEvent::MoveRejected { object_id, .. }
            | SyncEvent::ForeignSubmit { object_id, .. }
            | SyncEvent::ForeignApply { object_id, .. }
            | SyncEvent::MalformedPayload { object_id, .. }
            | SyncEvent::RequestServed { object_id, .. } => *object_id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEvent::OutOfOrderSample { .. } => "out of order sample",
            SyncEvent::LargeCorrection { .. } => "large correction",
            SyncEvent::MoveRejected { .. } => "move rejected",
            SyncEvent::ForeignSubmit { .. } => "submit from non-owner",
            SyncEvent::ForeignApply { .. } => "apply from non-server",
            SyncEvent::MalformedPayload { .. } => "malformed payload",
            SyncEvent::RequestServed { .. } => "request served",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub samples_sent: u64,
    pub samples_received: u64,
    pub samples_relayed: u64,
    pub suppressed_ticks: u64,
    pub rejected: u64,
    pub out_of_order: u64,
    pub malformed: u64,
    pub large_corrections: u64,
    pub requests_served: u64,
    pub send_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("teleport is not supported; re-synchronize explicitly")]
    TeleportUnsupported,
}
