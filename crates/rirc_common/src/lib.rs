//! Leaf types shared across `rirc`'s crates: bounded channel names, the ordered nick set, and
//! the fixed-capacity rings used for scrollback and input history. No IRC-specific behavior
//! lives here; see `rirc_wire` for the protocol and `rirc_core` for the session engine.

mod chan_name;
pub mod limits;
mod ordered_set;
mod ring;

pub use chan_name::{ChanName, ChanNameRef};
pub use ordered_set::{InsertResult, OrderedSet, RemoveResult};
pub use ring::Ring;
