//! IRC wire protocol: parsing incoming lines and formatting outgoing ones, per RFC 2812.
//!
//! This crate is a leaf: it knows nothing about sockets, servers, or channel state. `rirc_core`
//! builds the session engine on top of the types exposed here.

mod ctcp;
mod format;
mod parse;

pub use ctcp::{parse_ctcp, CTCP};
pub use format::{
    action, format_line, join, nick, notice, part, pass, ping, pong, privmsg, quit, user,
    FormatError, MAX_PAYLOAD,
};
pub use parse::{parse, parse_raw, Cmd, Msg, MsgTarget, Pfx, RawMsg};
