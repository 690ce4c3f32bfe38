pub mod buffer;
pub mod frame;
pub mod net;
pub mod schedule;
pub mod session;
pub mod sync;

pub use buffer::{RollingAverage, TimedSampleBuffer};
pub use frame::{FrameResolver, NoPlatforms, ParentRef, PlatformMap, PlatformRegistry};
pub use net::{
    ClientId, LoopbackHub, LoopbackPort, NetworkSimulator, NetworkStats, ObjectId,
    PacketError, PacketLossSimulation, RpcChannel, RpcKind, RpcMessage, SERVER_CLIENT_ID,
    TransformSample, WireError,
};
pub use schedule::{FixedTimestep, PollHandle, Scheduler, Tickable};
pub use session::{ManualClock, NetworkClock, SessionContext, SystemClock};
pub use sync::{
    EndpointFlags, NetworkedTransform, OwnershipState, SyncConfig, SyncError, SyncEvent,
    SyncStats, TransformTable,
};
