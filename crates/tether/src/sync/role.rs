use bitflags::bitflags;

use crate::net::ClientId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EndpointFlags: u8 {
        const SERVER = 1 << 0;
        const CLIENT = 1 << 1;
        const HOST = Self::SERVER.bits() | Self::CLIENT.bits();
    }
}

/// How this endpoint relates to one synchronized object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipState {
    /// Local authority; produces samples.
    Owner,
    /// Server side of a client-owned object; validates and relays.
    ServerAuthority,
    /// Renders samples that arrive from elsewhere.
    RemoteObserver,
}

impl OwnershipState {
    pub fn resolve(flags: EndpointFlags, local_client_id: ClientId, owner_client_id: ClientId) -> Self {
        if local_client_id == owner_client_id {
            Self::Owner
        } else if flags.contains(EndpointFlags::SERVER) {
            Self::ServerAuthority
        } else {
            Self::RemoteObserver
        }
    }

    pub fn is_owner(self) -> bool {
        self == Self::Owner
    }
}
