mod packed;
mod protocol;
mod sample;
mod simulator;
mod stats;
mod transport;

pub use packed::{PackedReader, PackedWriter, WireError};
pub use protocol::{
    ClientId, DEFAULT_FRAME_RATE, DEFAULT_SEND_RATE, MAX_ENVELOPE_SIZE, ObjectId, PacketError,
    RpcKind, RpcMessage, SERVER_CLIENT_ID,
};
pub use sample::{MAX_SAMPLE_SIZE, ROTATION_TOLERANCE_RAD, TransformSample};
pub use simulator::NetworkSimulator;
pub use stats::{NetworkStats, PacketLossSimulation};
pub use transport::{LoopbackHub, LoopbackPort, Recipient, RecordingChannel, RpcChannel};
