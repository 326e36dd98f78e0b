//! Incoming-line parser, RFC 2812 section 2.3.1.
//!
//! `parse_raw` borrows substrings out of the input line without allocating, exposing
//! `{prefix?, command, params[0..n], trailing?}`. A borrowing slice-based parser plays nicer with
//! Rust's ownership rules than parsing destructively in place. `parse` builds on it to produce
//! the typed `Msg`/`Cmd` the session engine dispatches on.

use crate::ctcp::{parse_ctcp, CTCP};
use rirc_common::ChanName;

/// Maximum middle (non-trailing) parameters per RFC 2812 section 2.3.1.
const MAX_PARAMS: usize = 14;

/// Borrowed view of one parsed IRC line.
#[derive(Debug, PartialEq, Eq)]
pub struct RawMsg<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
    pub trailing: Option<&'a str>,
}

/// Parses one CR/LF-stripped line, up to 512 bytes. Returns `None` when no command token is
/// present (a malformed line: the caller logs and drops it, keeping the connection).
pub fn parse_raw(line: &str) -> Option<RawMsg<'_>> {
    let mut rest = line;

    let prefix = if let Some(stripped) = rest.strip_prefix(':') {
        let (pfx, after) = split_once_space(stripped);
        rest = after;
        Some(pfx)
    } else {
        None
    };

    let rest = rest.trim_start_matches(' ');
    let (command, mut rest) = split_once_space(rest);
    if command.is_empty() {
        return None;
    }

    let mut params = Vec::new();
    let mut trailing = None;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(t) = rest.strip_prefix(':') {
            trailing = Some(t);
            break;
        }
        if params.len() == MAX_PARAMS {
            trailing = Some(rest);
            break;
        }
        let (tok, after) = split_once_space(rest);
        params.push(tok);
        rest = after;
    }

    Some(RawMsg {
        prefix,
        command,
        params,
        trailing,
    })
}

/// Splits on the first SPACE, returning `(before, after)`. `after` is empty when there's no
/// SPACE in `s`.
fn split_once_space(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

/// Sender of a message ("prefix" in the RFC).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Pfx {
    /// Sender is a server name.
    Server(String),
    /// Sender is a user: nick plus the `user@host` part (if any).
    User { nick: String, hostinfo: String },
}

fn parse_pfx(pfx: &str) -> Pfx {
    match pfx.find(['!', '@']) {
        Some(idx) => Pfx::User {
            nick: pfx[..idx].to_owned(),
            hostinfo: pfx[idx + 1..].to_owned(),
        },
        None => {
            // No '!'/'@': ambiguous between a bare nick and a server name. A name containing a
            // '.' is treated as a server name; otherwise it's a nick (the common case for
            // JOIN/PART/QUIT/NICK/KICK).
            if pfx.contains('.') {
                Pfx::Server(pfx.to_owned())
            } else {
                Pfx::User {
                    nick: pfx.to_owned(),
                    hostinfo: String::new(),
                }
            }
        }
    }
}

impl Pfx {
    pub fn nick(&self) -> Option<&str> {
        match self {
            Pfx::User { nick, .. } => Some(nick),
            Pfx::Server(_) => None,
        }
    }
}

/// Target of an incoming PRIVMSG/NOTICE.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MsgTarget {
    Chan(ChanName),
    Nick(String),
}

/// A parsed, dispatch-ready command. `Numeric` and `Other` retain raw params/trailing for
/// handlers that need generic access (e.g. numeric replies routed straight to the server buffer).
#[derive(Debug, PartialEq, Eq)]
pub enum Cmd {
    Ping { payload: Option<String> },
    Pong { payload: Option<String> },
    Join { chan: ChanName },
    Part { chan: ChanName, reason: Option<String> },
    Quit { reason: Option<String> },
    Nick { new_nick: String },
    Kick { chan: ChanName, nick: String, reason: Option<String> },
    Mode { target: String, modes: Vec<String> },
    Privmsg { target: MsgTarget, text: String, is_notice: bool, ctcp: Option<CTCP> },
    Numeric { code: u16, params: Vec<String>, trailing: Option<String> },
    Other { command: String, params: Vec<String>, trailing: Option<String> },
}

/// A fully parsed message: optional sender plus the typed command.
#[derive(Debug, PartialEq, Eq)]
pub struct Msg {
    pub pfx: Option<Pfx>,
    pub cmd: Cmd,
}

/// Parses one line into a dispatch-ready [`Msg`]. Returns `None` on a missing command: the
/// caller logs and drops the line, keeping the connection.
pub fn parse(line: &str) -> Option<Msg> {
    let raw = parse_raw(line)?;
    let pfx = raw.prefix.map(parse_pfx);

    let owned_params: Vec<String> = raw.params.iter().map(|s| (*s).to_owned()).collect();
    let trailing = raw.trailing.map(|s| s.to_owned());

    let cmd = build_cmd(raw.command, owned_params, trailing);
    Some(Msg { pfx, cmd })
}

fn build_cmd(command: &str, mut params: Vec<String>, trailing: Option<String>) -> Cmd {
    let upper = command.to_ascii_uppercase();
    match upper.as_str() {
        "PING" => Cmd::Ping { payload: trailing.or_else(|| params.pop()) },
        "PONG" => Cmd::Pong { payload: trailing.or_else(|| params.pop()) },
        "JOIN" => {
            let name = params.first().cloned().or_else(|| trailing.clone()).unwrap_or_default();
            Cmd::Join { chan: ChanName::new(name) }
        }
        "PART" => {
            let name = params.first().cloned().unwrap_or_default();
            Cmd::Part { chan: ChanName::new(name), reason: trailing }
        }
        "QUIT" => Cmd::Quit { reason: trailing },
        "NICK" => {
            let new_nick = trailing.or_else(|| params.first().cloned()).unwrap_or_default();
            Cmd::Nick { new_nick }
        }
        "KICK" => {
            let chan = params.first().cloned().unwrap_or_default();
            let nick = params.get(1).cloned().unwrap_or_default();
            Cmd::Kick { chan: ChanName::new(chan), nick, reason: trailing }
        }
        "MODE" => {
            if params.is_empty() {
                Cmd::Mode { target: String::new(), modes: vec![] }
            } else {
                let target = params.remove(0);
                Cmd::Mode { target, modes: params }
            }
        }
        "PRIVMSG" | "NOTICE" => {
            let target_str = params.first().cloned().unwrap_or_default();
            let text = trailing.unwrap_or_default();
            let ctcp = parse_ctcp(&text);
            let target = if target_str.starts_with(['#', '&', '+', '!']) {
                MsgTarget::Chan(ChanName::new(target_str))
            } else {
                MsgTarget::Nick(target_str)
            };
            Cmd::Privmsg {
                target,
                text,
                is_notice: upper == "NOTICE",
                ctcp,
            }
        }
        _ => {
            if upper.len() == 3 && upper.chars().all(|c| c.is_ascii_digit()) {
                Cmd::Numeric {
                    code: upper.parse().unwrap(),
                    params,
                    trailing,
                }
            } else {
                Cmd::Other {
                    command: command.to_owned(),
                    params,
                    trailing,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names_reply() {
        let raw = parse_raw(":irc.example.net 353 me = #chan :alice @bob +carol").unwrap();
        assert_eq!(raw.prefix, Some("irc.example.net"));
        assert_eq!(raw.command, "353");
        assert_eq!(raw.params, vec!["me", "=", "#chan"]);
        assert_eq!(raw.trailing, Some("alice @bob +carol"));

        let msg = parse(":irc.example.net 353 me = #chan :alice @bob +carol").unwrap();
        assert_eq!(msg.pfx, Some(Pfx::Server("irc.example.net".to_owned())));
        match msg.cmd {
            Cmd::Numeric { code, params, trailing } => {
                assert_eq!(code, 353);
                assert_eq!(params, vec!["me", "=", "#chan"]);
                assert_eq!(trailing, Some("alice @bob +carol".to_owned()));
            }
            other => panic!("expected Numeric, got {:?}", other),
        }
    }

    #[test]
    fn self_join() {
        let msg = parse(":bob!bob@h JOIN :#dev").unwrap();
        assert_eq!(
            msg.pfx,
            Some(Pfx::User {
                nick: "bob".to_owned(),
                hostinfo: "bob@h".to_owned()
            })
        );
        match msg.cmd {
            Cmd::Join { chan } => assert_eq!(chan.display(), "#dev"),
            other => panic!("expected Join, got {:?}", other),
        }
    }

    #[test]
    fn trailing_with_embedded_colon_is_literal() {
        let raw = parse_raw("PRIVMSG #c :hello :world").unwrap();
        assert_eq!(raw.command, "PRIVMSG");
        assert_eq!(raw.params, vec!["#c"]);
        assert_eq!(raw.trailing, Some("hello :world"));
    }

    #[test]
    fn missing_command_fails() {
        assert!(parse_raw("").is_none());
        assert!(parse_raw(":only.a.prefix").is_none());
    }

    #[test]
    fn ping_pong_roundtrip() {
        let msg = parse("PING :irc.example.net").unwrap();
        assert_eq!(
            msg.cmd,
            Cmd::Ping {
                payload: Some("irc.example.net".to_owned())
            }
        );
    }

    #[test]
    fn privmsg_to_channel_vs_nick() {
        let msg = parse(":alice!a@h PRIVMSG #chan :hi").unwrap();
        match msg.cmd {
            Cmd::Privmsg { target, text, .. } => {
                assert_eq!(target, MsgTarget::Chan(ChanName::new("#chan".to_owned())));
                assert_eq!(text, "hi");
            }
            other => panic!("expected Privmsg, got {:?}", other),
        }

        let msg = parse(":alice!a@h PRIVMSG bob :hi there").unwrap();
        match msg.cmd {
            Cmd::Privmsg { target, .. } => {
                assert_eq!(target, MsgTarget::Nick("bob".to_owned()));
            }
            other => panic!("expected Privmsg, got {:?}", other),
        }
    }

    #[test]
    fn more_than_14_middle_params_overflow_into_trailing() {
        let line = "CMD a b c d e f g h i j k l m n o p";
        let raw = parse_raw(line).unwrap();
        assert_eq!(raw.params.len(), 14);
        assert_eq!(raw.trailing, Some("o p"));
    }
}
