//! Error taxonomy for one session's lifetime.
//!
//! Every variant here terminates the owning session (spec error classes
//! 1-4: Transport, Protocol, Cryptographic, Replay/ordering). Routing
//! failures (class 5, unknown `target_id`) are *not* represented here —
//! they produce an encrypted `error` reply and the session stays open,
//! so that path never constructs a `SessionError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("frame truncated mid-read")]
    Truncated,

    #[error("frame length {0} exceeds ceiling {1}")]
    Oversized(u32, u32),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("cryptographic failure: {0}")]
    Crypto(String),

    #[error("replay or reordering detected: seq {seq} <= last accepted {last}")]
    Replay { seq: u64, last: u64 },
}

impl SessionError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        SessionError::Protocol(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        SessionError::Crypto(msg.into())
    }
}

/// Fatal at the process level: startup failures (spec error class 6).
/// Bins map these to a diagnostic on stderr and a non-zero exit code.
pub type StartupResult<T> = anyhow::Result<T>;
