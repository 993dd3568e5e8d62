//! Error types shared by the bus, the command dispatcher and the process
//! entry points.
//!
//! Probe failures live next to the probe in `ping::probe` because they carry
//! partial timings; everything that crosses a component boundary is here.

use thiserror::Error;

/// Failure of the publish/subscribe transport.
#[derive(Debug, Error)]
pub enum BusError {
    /// The connection to the broker is gone.
    #[error("bus connection closed")]
    Disconnected,

    /// The broker state could not be accessed.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("bus transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("failed to encode bus frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a measurement request could not be dispatched.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request itself is unusable; nothing was published.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to encode start command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Process-level failures surfaced by the binary.
#[derive(Debug, Error)]
pub enum PingError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}
