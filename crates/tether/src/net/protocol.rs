use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

pub type ClientId = u32;
pub type ObjectId = u32;

/// The dedicated server's id on the transport. Clients are numbered from 1.
pub const SERVER_CLIENT_ID: ClientId = 0;

pub const DEFAULT_SEND_RATE: f32 = 20.0;
pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const MAX_ENVELOPE_SIZE: usize = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum RpcKind {
    /// Owner client -> server: a sample to validate and relay.
    SubmitTransform,
    /// Server or server-owned object -> observers: a sample to render.
    ApplyTransform,
    /// Joining client -> server: send me the current transform.
    RequestTransform,
}

/// Transport envelope: which object, which call, who sent it, and the
/// opaque sample bytes.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct RpcMessage {
    pub object_id: ObjectId,
    pub kind: RpcKind,
    pub origin: ClientId,
    pub payload: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("envelope of {0} bytes exceeds the transport limit")]
    TooLarge(usize),
}

impl RpcMessage {
    pub fn new(object_id: ObjectId, kind: RpcKind, origin: ClientId, payload: Vec<u8>) -> Self {
        Self {
            object_id,
            kind,
            origin,
            payload,
        }
    }

    pub fn request(object_id: ObjectId, origin: ClientId) -> Self {
        Self::new(object_id, RpcKind::RequestTransform, origin, Vec::new())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)?;
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(PacketError::TooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        // Datagrams arrive with arbitrary alignment; archived access needs it.
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(PacketError::Deserialize)
    }
}
