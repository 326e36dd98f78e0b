//! Outgoing message formatting. Builders below produce a *payload* (command plus arguments, no
//! CR LF) which [`format_line`] validates and terminates, split into a pure formatting step so
//! it can be unit tested without a socket.

use rirc_common::ChanNameRef;
use thiserror::Error;

/// Maximum payload length, not counting the CR LF terminator.
pub const MAX_PAYLOAD: usize = 510;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("not connected")]
    NotConnected,
    #[error("invalid format: payload contains an embedded line terminator")]
    InvalidFormat,
    #[error("payload exceeds {MAX_PAYLOAD} bytes")]
    TooLong,
}

/// Validates `payload` and appends a CR LF terminator, ready for transmission.
///
/// - `connected` false => [`FormatError::NotConnected`].
/// - Payload containing a bare CR or LF => [`FormatError::InvalidFormat`] (it would corrupt line
///   framing).
/// - Payload longer than [`MAX_PAYLOAD`] bytes => [`FormatError::TooLong`].
/// - Empty payload is a silent no-op: `Ok(String::new())` is returned, and callers must treat an
///   empty result as "nothing to transmit" rather than an error.
pub fn format_line(connected: bool, payload: &str) -> Result<String, FormatError> {
    if payload.is_empty() {
        return Ok(String::new());
    }
    if !connected {
        return Err(FormatError::NotConnected);
    }
    if payload.contains(['\r', '\n']) {
        return Err(FormatError::InvalidFormat);
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(FormatError::TooLong);
    }
    let mut line = String::with_capacity(payload.len() + 2);
    line.push_str(payload);
    line.push_str("\r\n");
    Ok(line)
}

pub fn pass(pass: &str) -> String {
    format!("PASS {}", pass)
}

pub fn quit(reason: Option<&str>) -> String {
    match reason {
        None => "QUIT".to_owned(),
        Some(reason) => format!("QUIT :{}", reason),
    }
}

pub fn user(username: &str, realname: &str) -> String {
    format!("USER {} 8 * :{}", username, realname)
}

pub fn nick(nick: &str) -> String {
    format!("NICK {}", nick)
}

pub fn ping(arg: &str) -> String {
    format!("PING {}", arg)
}

pub fn pong(arg: &str) -> String {
    format!("PONG :{}", arg)
}

pub fn join<'a, I>(chans: I) -> String
where
    I: Iterator<Item = &'a ChanNameRef>,
{
    let chans: Vec<&str> = chans.map(|c| c.display()).collect();
    format!("JOIN {}", chans.join(","))
}

pub fn part(chan: &ChanNameRef, reason: Option<&str>) -> String {
    match reason {
        None => format!("PART {}", chan.display()),
        Some(reason) => format!("PART {} :{}", chan.display(), reason),
    }
}

pub fn privmsg(target: &str, msg: &str) -> String {
    format!("PRIVMSG {} :{}", target, msg)
}

pub fn notice(target: &str, msg: &str) -> String {
    format!("NOTICE {} :{}", target, msg)
}

pub fn action(target: &str, msg: &str) -> String {
    format!("PRIVMSG {} :\x01ACTION {}\x01", target, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_noop() {
        assert_eq!(format_line(true, ""), Ok(String::new()));
    }

    #[test]
    fn not_connected_is_rejected_before_length_check() {
        assert_eq!(format_line(false, "PING x"), Err(FormatError::NotConnected));
    }

    #[test]
    fn exactly_max_payload_is_accepted() {
        let payload = "a".repeat(MAX_PAYLOAD);
        let formatted = format_line(true, &payload).unwrap();
        assert_eq!(formatted, payload + "\r\n");
    }

    #[test]
    fn over_max_payload_is_too_long() {
        let payload = "a".repeat(MAX_PAYLOAD + 1);
        assert_eq!(format_line(true, &payload), Err(FormatError::TooLong));
    }

    #[test]
    fn embedded_newline_is_invalid() {
        assert_eq!(
            format_line(true, "PRIVMSG #c :hi\r\nQUIT"),
            Err(FormatError::InvalidFormat)
        );
    }

    #[test]
    fn privmsg_builder_shape() {
        assert_eq!(privmsg("#chan", "hi"), "PRIVMSG #chan :hi");
        assert_eq!(
            action("#chan", "waves"),
            "PRIVMSG #chan :\x01ACTION waves\x01"
        );
    }
}
