//! Error kinds surfaced to channel buffers as system lines (`spec.md` section 7).
//!
//! `Fatal` (OOM / broken invariant) has no recoverable Rust representation: an impossible
//! invariant is a `panic!` at the point it's discovered (debug-assert style), matching the
//! reference's "process exits with a single stderr line" contract, not a `Result` variant here.

use rirc_wire::FormatError;
use thiserror::Error;

/// Failures from the background connect worker (`spec.md` section 4.4 "Connect worker").
#[derive(Debug, Error, Clone)]
pub enum ConnectError {
    #[error("could not resolve {host}: {message}")]
    Resolve { host: String, message: String },
    #[error("could not connect to {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },
    #[error("TLS handshake with {host} failed: {message}")]
    Tls { host: String, message: String },
}

/// Failures surfaced during a live session (`spec.md` section 7).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("send failed: {0}")]
    Send(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed line, dropped: {0:?}")]
    Protocol(String),

    #[error("remote hangup")]
    RemoteHangup,

    #[error("ping timeout ({0})")]
    PingTimeout(u64),
}
