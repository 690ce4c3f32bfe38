mod config;
mod events;
mod role;
mod table;
mod timer;
mod transform;

pub use config::SyncConfig;
pub use events::{SyncError, SyncEvent, SyncStats};
pub use role::{EndpointFlags, OwnershipState};
pub use table::TransformTable;
pub use timer::InactivityTimer;
pub use transform::{MoveValidator, NetworkedTransform};
