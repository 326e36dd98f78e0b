//! Incoming-message dispatch (`spec.md` section 4.4 "User message handling").
//!
//! Grounded on the teacher's `libtiny_client::state` (which mutates the same kind of per-server
//! nick-set/mode state on each parsed message) and `tiny::conn` (numeric-reply routing to the
//! server tab). Every function here is pure with respect to the network: it mutates `server` and
//! returns the lines the caller should transmit.

use rirc_common::{ChanName, ChanNameRef};
use rirc_wire::{Cmd, Msg, MsgTarget, CTCP};

use crate::buffer::{pseudo_sender, BufferLine, BufferType, LineKind};
use crate::server::Server;

/// Dispatches one parsed message, mutating `server`'s channel/nick/mode state and returning any
/// lines that should be transmitted in response (e.g. a PONG).
pub fn dispatch(server: &mut Server, msg: Msg, now: u64) -> Vec<String> {
    let mut out = Vec::new();
    let sender_nick = msg.pfx.as_ref().and_then(|p| p.nick()).map(str::to_owned);

    match msg.cmd {
        Cmd::Ping { payload } => {
            out.push(rirc_wire::pong(payload.as_deref().unwrap_or("")));
        }
        Cmd::Pong { .. } => {
            // Liveness bookkeeping (`latency_time`/`pinging`) is reset by the engine for every
            // inbound line before dispatch runs; nothing command-specific to do here.
        }
        Cmd::Join { chan } => handle_join(server, sender_nick.as_deref(), &chan, now),
        Cmd::Part { chan, reason } => {
            handle_part(server, sender_nick.as_deref(), &chan, reason, now)
        }
        Cmd::Quit { reason } => handle_quit(server, sender_nick.as_deref(), reason, now),
        Cmd::Nick { new_nick } => handle_nick(server, sender_nick.as_deref(), &new_nick, now),
        Cmd::Kick {
            chan,
            nick,
            reason,
        } => handle_kick(server, &chan, &nick, reason, now),
        Cmd::Mode { target, modes } => handle_mode(server, &target, &modes, now),
        Cmd::Privmsg {
            target,
            text,
            is_notice,
            ctcp,
        } => handle_privmsg(server, sender_nick.as_deref(), target, text, is_notice, ctcp, now),
        Cmd::Numeric {
            code,
            params,
            trailing,
        } => out.extend(handle_numeric(server, code, params, trailing, now)),
        Cmd::Other {
            command, trailing, ..
        } => {
            log::debug!("unhandled command {command} on {}: {trailing:?}", server.info.host);
        }
    }

    out
}

fn is_ignored(server: &Server, nick: &str) -> bool {
    server.ignore.contains(&nick.to_ascii_lowercase())
}

fn find_chan_idx(server: &Server, chan: &ChanNameRef) -> Option<usize> {
    server.channels.iter().position(|c| c.name.as_ref() == chan)
}

fn handle_join(server: &mut Server, sender_nick: Option<&str>, chan: &ChanName, now: u64) {
    let Some(nick) = sender_nick else { return };
    if is_ignored(server, nick) {
        return;
    }

    let is_self = nick.eq_ignore_ascii_case(server.nick());
    if is_self {
        let idx = server.channel_idx_or_create(chan.as_ref(), BufferType::Channel);
        server.current_channel = idx;
        server.channels[idx].parted = false;
        let nick = nick.to_owned();
        server.channels[idx].nicks.insert(nick);
        server.push_system_line(idx, format!("You have joined {}", chan.display()), now);
    } else if let Some(idx) = find_chan_idx(server, chan.as_ref()) {
        server.channels[idx].nicks.insert(nick.to_owned());
        let over_threshold = server.join_part_quit_threshold > 0
            && server.channels[idx].nick_count() > server.join_part_quit_threshold;
        if !over_threshold {
            server.push_system_line(idx, format!("{nick} has joined {}", chan.display()), now);
        }
    }
}

fn handle_part(
    server: &mut Server,
    sender_nick: Option<&str>,
    chan: &ChanName,
    reason: Option<String>,
    now: u64,
) {
    let Some(nick) = sender_nick else { return };
    if is_ignored(server, nick) {
        return;
    }
    let Some(idx) = find_chan_idx(server, chan.as_ref()) else {
        return;
    };

    server.channels[idx].nicks.remove(nick);
    let is_self = nick.eq_ignore_ascii_case(server.nick());
    if is_self {
        server.channels[idx].parted = true;
    }
    let line = match &reason {
        Some(r) => format!("{nick} has left {} ({r})", chan.display()),
        None => format!("{nick} has left {}", chan.display()),
    };
    server.push_system_line(idx, line, now);
}

fn handle_quit(server: &mut Server, sender_nick: Option<&str>, reason: Option<String>, now: u64) {
    let Some(nick) = sender_nick else { return };
    if is_ignored(server, nick) {
        return;
    }

    for idx in 0..server.channels.len() {
        if server.channels[idx].nicks.remove(nick) == rirc_common::RemoveResult::Removed {
            let line = match &reason {
                Some(r) => format!("{nick} has quit ({r})"),
                None => format!("{nick} has quit"),
            };
            server.push_system_line(idx, line, now);
        }
    }
}

fn handle_nick(server: &mut Server, sender_nick: Option<&str>, new_nick: &str, now: u64) {
    let Some(old_nick) = sender_nick else { return };

    let is_self = old_nick.eq_ignore_ascii_case(server.nick());
    let mut renamed_in_any = false;
    for chan in server.channels.iter_mut() {
        if chan.nicks.remove(old_nick) == rirc_common::RemoveResult::Removed {
            chan.nicks.insert(new_nick.to_owned());
            renamed_in_any = true;
        }
    }

    if is_self {
        server.set_current_nick(new_nick);
    }

    if renamed_in_any || is_self {
        server.push_server_line(
            pseudo_sender::INFO,
            format!("{old_nick} is now known as {new_nick}"),
            now,
        );
    }
}

fn handle_kick(
    server: &mut Server,
    chan: &ChanName,
    nick: &str,
    reason: Option<String>,
    now: u64,
) {
    let Some(idx) = find_chan_idx(server, chan.as_ref()) else {
        return;
    };
    server.channels[idx].nicks.remove(nick);
    let is_self = nick.eq_ignore_ascii_case(server.nick());
    if is_self {
        server.channels[idx].parted = true;
    }
    let line = match &reason {
        Some(r) => format!("{nick} was kicked from {} ({r})", chan.display()),
        None => format!("{nick} was kicked from {}", chan.display()),
    };
    server.push_system_line(idx, line, now);
}

/// Only `modes[0]` (the `+`/`-` letter run) is a mode-letter string; any further positional
/// arguments (op target, ban mask, key, limit) are opaque to this core and never fed through
/// `apply_mode_run` (`spec.md` section 4.4: "applying `+`/`-` runs over the *argument letters*").
fn handle_mode(server: &mut Server, target: &str, modes: &[String], now: u64) {
    let Some(mode_run) = modes.first() else {
        return;
    };

    if target.eq_ignore_ascii_case(server.nick()) {
        apply_mode_run(&mut server.usermodes, mode_run);
        return;
    }

    let chan_ref = ChanName::new(target.to_owned());
    if let Some(idx) = find_chan_idx(server, chan_ref.as_ref()) {
        server.channels[idx].apply_modes(mode_run);
        let display = modes.join(" ");
        server.push_system_line(idx, format!("mode/{target} [{display}]"), now);
    }
}

fn apply_mode_run(set: &mut std::collections::BTreeSet<char>, modes: &str) {
    let mut adding = true;
    for c in modes.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            letter => {
                if adding {
                    set.insert(letter);
                } else {
                    set.remove(&letter);
                }
            }
        }
    }
}

fn handle_privmsg(
    server: &mut Server,
    sender_nick: Option<&str>,
    target: MsgTarget,
    text: String,
    is_notice: bool,
    ctcp: Option<CTCP>,
    now: u64,
) {
    let Some(nick) = sender_nick else { return };
    if is_ignored(server, nick) {
        return;
    }

    let (display_sender, display_text) = match ctcp {
        Some(CTCP::Action(action)) => ("*".to_owned(), format!("{nick} {action}")),
        Some(CTCP::Other(other)) => {
            log::debug!("CTCP {other} from {nick}, not auto-replying (ACTION-only passthrough)");
            (nick.to_owned(), text.clone())
        }
        None => (nick.to_owned(), text.clone()),
    };

    let idx = match target {
        MsgTarget::Chan(chan) => server.channel_idx_or_create(chan.as_ref(), BufferType::Channel),
        MsgTarget::Nick(ref to) if to.eq_ignore_ascii_case(server.nick()) => {
            let pm_name = ChanName::new(nick.to_owned());
            server.channel_idx_or_create(pm_name.as_ref(), BufferType::Private)
        }
        MsgTarget::Nick(_) => return,
    };

    let local_nick = server.nick().to_owned();
    let (kind, bell) = if is_notice {
        (LineKind::Default, false)
    } else {
        server.channels[idx].detect_ping(&display_text, &local_nick)
    };

    server.channels[idx].push_line(BufferLine::new(now, display_sender, display_text, kind));
    if bell {
        log::info!("pinged in {}", server.channels[idx].name.display());
    }
}

/// Strips NAMES-reply mode-prefix characters (`@+%&~`), per `spec.md` section 4.4's 353 bullet.
fn strip_nick_prefix(nick: &str) -> &str {
    nick.trim_start_matches(['@', '+', '%', '&', '~'])
}

fn handle_numeric(
    server: &mut Server,
    code: u16,
    params: Vec<String>,
    trailing: Option<String>,
    now: u64,
) -> Vec<String> {
    match code {
        1 => {
            // RPL_WELCOME: registration has completed: this is the first point a server accepts
            // JOIN, so auto-joined channels (`-j`/config `join:`) are sent now rather than
            // immediately after USER.
            let text = render_numeric(&params, trailing.as_deref());
            server.push_server_line(pseudo_sender::INFO, text, now);
            server
                .info
                .auto_join
                .iter()
                .map(|c| rirc_wire::join(std::iter::once(c.as_ref())))
                .collect()
        }
        433 => {
            // ERR_NICKNAMEINUSE: try the next configured nick (`spec.md` scenario 2).
            match server.try_next_nick() {
                Some(next) => {
                    let next = next.to_owned();
                    server.push_server_line(
                        pseudo_sender::INFO,
                        format!("Nick already in use, trying {next}"),
                        now,
                    );
                    vec![rirc_wire::nick(&next)]
                }
                None => {
                    server.push_error_line(0, "No more nicks to try".to_owned(), now);
                    Vec::new()
                }
            }
        }
        353 => {
            // RPL_NAMREPLY: params = [nick, chan_type, chan], trailing = space-separated nicks.
            if let (Some(chan_name), Some(names)) = (params.get(2), trailing) {
                let chan = ChanName::new(chan_name.clone());
                let idx = server.channel_idx_or_create(chan.as_ref(), BufferType::Channel);
                for raw in names.split_whitespace() {
                    server.channels[idx].nicks.insert(strip_nick_prefix(raw).to_owned());
                }
            }
            Vec::new()
        }
        _ => {
            let text = render_numeric(&params, trailing.as_deref());
            server.push_server_line(pseudo_sender::INFO, text, now);
            Vec::new()
        }
    }
}

fn render_numeric(params: &[String], trailing: Option<&str>) -> String {
    let mut parts: Vec<&str> = params.iter().skip(1).map(String::as_str).collect();
    if let Some(t) = trailing {
        parts.push(t);
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerInfo;

    fn server() -> Server {
        let mut s = Server::new(ServerInfo {
            host: "irc.example.net".to_owned(),
            port: 6667,
            tls: false,
            pass: None,
            username: "rirc".to_owned(),
            realname: "rirc".to_owned(),
            nicks: vec!["bob".to_owned()],
            auto_join: vec![],
        });
        s.set_current_nick("bob");
        s
    }

    #[test]
    fn names_reply_populates_nick_set() {
        let mut s = server();
        let msg = rirc_wire::parse(":irc.example.net 353 me = #chan :alice @bob +carol").unwrap();
        dispatch(&mut s, msg, 0);
        let idx = find_chan_idx(&s, ChanName::new("#chan".to_owned()).as_ref()).unwrap();
        assert_eq!(s.channels[idx].nick_count(), 3);
        assert!(s.channels[idx].nicks.contains("alice"));
        assert!(s.channels[idx].nicks.contains("bob"));
        assert!(s.channels[idx].nicks.contains("carol"));
    }

    #[test]
    fn self_join_creates_channel_and_sets_current() {
        let mut s = server();
        let msg = rirc_wire::parse(":bob!bob@h JOIN :#dev").unwrap();
        dispatch(&mut s, msg, 0);
        let idx = find_chan_idx(&s, ChanName::new("#dev".to_owned()).as_ref()).unwrap();
        assert_eq!(s.current_channel, idx);
        assert!(s.channels[idx].nicks.contains("bob"));
    }

    #[test]
    fn ignored_nick_privmsg_is_dropped() {
        let mut s = server();
        s.ignore.insert("eve".to_owned());
        let before = {
            let msg = rirc_wire::parse(":bob!bob@h JOIN :#c").unwrap();
            dispatch(&mut s, msg, 0);
            let idx = find_chan_idx(&s, ChanName::new("#c".to_owned()).as_ref()).unwrap();
            s.channels[idx].scrollback.len()
        };
        let msg = rirc_wire::parse(":eve!e@h PRIVMSG #c :hi").unwrap();
        dispatch(&mut s, msg, 0);
        let idx = find_chan_idx(&s, ChanName::new("#c".to_owned()).as_ref()).unwrap();
        assert_eq!(s.channels[idx].scrollback.len(), before);
    }

    #[test]
    fn ping_replies_with_pong() {
        let mut s = server();
        let msg = rirc_wire::parse("PING :irc.example.net").unwrap();
        let out = dispatch(&mut s, msg, 0);
        assert_eq!(out, vec!["PONG :irc.example.net".to_owned()]);
    }

    #[test]
    fn welcome_numeric_sends_auto_join() {
        let mut s = server();
        s.info.auto_join = vec![ChanName::new("#rirc".to_owned()), ChanName::new("#other".to_owned())];
        let msg = rirc_wire::parse(":irc.example.net 001 bob :Welcome to the network").unwrap();
        let out = dispatch(&mut s, msg, 0);
        assert_eq!(out, vec!["JOIN #rirc".to_owned(), "JOIN #other".to_owned()]);
    }

    #[test]
    fn quit_removes_nick_from_every_channel() {
        let mut s = server();
        for chan in ["#a", "#b"] {
            let join = rirc_wire::parse(&format!(":carol!c@h JOIN :{chan}")).unwrap();
            dispatch(&mut s, join, 0);
        }
        let quit = rirc_wire::parse(":carol!c@h QUIT :bye").unwrap();
        dispatch(&mut s, quit, 0);
        for chan in ["#a", "#b"] {
            let idx = find_chan_idx(&s, ChanName::new(chan.to_owned()).as_ref()).unwrap();
            assert!(!s.channels[idx].nicks.contains("carol"));
        }
    }
}
