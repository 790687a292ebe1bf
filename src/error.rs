//! Errors surfaced at the crate's fallible boundaries
//!
//! The simulation itself never fails: placement and movement are boolean or
//! resolved in place. Only config loading, the wire codec and the transport
//! produce errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message or config: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("peer disconnected")]
    Disconnected,

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
