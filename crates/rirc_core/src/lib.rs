//! Session engine crate: connection state machine, channel/nick model, dispatch, and the
//! polling tick that drives them.
//!
//! See `crates/rirc` for the CLI/config front end that embeds this crate. The engine is
//! tick-polled rather than task/`select!`-driven, so a caller can advance every server
//! deterministically from one place.

pub mod buffer;
pub mod connect;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod noop_waker;
pub mod server;
pub mod stream;
pub mod time;

#[cfg(test)]
mod tests;

pub use buffer::{Activity, BufferLine, BufferType, Channel, Input, LineKind};
pub use connect::{ConnectOutcome, PendingConnect};
pub use engine::Engine;
pub use error::{ConnectError, SessionError};
pub use server::{ConnState, ReadOutcome, Server, ServerInfo};
pub use stream::Stream;
