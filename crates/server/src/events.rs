use tether::{ClientId, ParentRef, SyncEvent};

#[derive(Debug, Clone)]
pub enum SandboxEvent {
    ClientJoined {
        client_id: ClientId,
    },
    ClientDisconnected {
        client_id: ClientId,
        reason: DisconnectReason,
    },
    Boarded {
        client_id: ClientId,
        platform: ParentRef,
    },
    Sync {
        endpoint: ClientId,
        event: SyncEvent,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Shutdown,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Shutdown => "dropped at shutdown",
        }
    }
}
