//! Host-authoritative replication
//!
//! The host runs the full simulation and owns every outcome. A peer renders
//! the host's snapshots, moves its own player locally and reports it back.

pub mod protocol;
pub mod session;
pub mod transport;

pub use protocol::{InputReport, Message, PlayerState, RoundStart, Snapshot, decode, encode};
pub use session::Session;
pub use transport::{LoopbackTransport, Transport};
