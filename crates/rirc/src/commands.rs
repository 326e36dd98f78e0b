//! In-client command dispatch: `/name rest` lines are split with
//! [`crate::utils::split_whitespace_indices`] and routed to one function per command, operating
//! directly on the session engine since this front end has no terminal UI to notify.

use rirc_common::ChanName;
use rirc_core::{BufferLine, BufferType, LineKind};

use crate::app::App;
use crate::utils::split_whitespace_indices;

/// Parses one line of user input. Lines starting with `/` are commands; everything else is chat
/// text sent to the current channel.
pub(crate) fn dispatch(app: &mut App, line: &str, now: u64) {
    let Some(rest) = line.strip_prefix('/') else {
        send_to_current(app, line.to_owned(), false, now);
        return;
    };

    // `//foo` escapes a literal message starting with a slash.
    if let Some(literal) = rest.strip_prefix('/') {
        send_to_current(app, format!("/{literal}"), false, now);
        return;
    }

    let (name, args) = split_cmd(rest);
    match name {
        "connect" => cmd_connect(app, args, now),
        "disconnect" => cmd_disconnect(app, args, now),
        "quit" => cmd_quit(app, args, now),
        "join" => cmd_join(app, args, now),
        "part" => cmd_part(app, args, now),
        "nick" => cmd_nick(app, args, now),
        "msg" => cmd_msg(app, args, now),
        "me" => send_to_current(app, args.to_owned(), true, now),
        "ignore" => cmd_ignore(app, args, now, true),
        "unignore" => cmd_ignore(app, args, now, false),
        "raw" => cmd_raw(app, args, now),
        "clear" => cmd_clear(app),
        other => {
            app.print_local(&format!("Unknown command: /{other}"));
        }
    }
}

fn split_cmd(rest: &str) -> (&str, &str) {
    let mut idxs = split_whitespace_indices(rest);
    let Some(_name_idx) = idxs.next() else {
        return (rest.trim(), "");
    };
    let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let name = &rest[..name_end];
    let args = match idxs.next() {
        Some(idx) => &rest[idx..],
        None => "",
    };
    (name, args)
}

fn send_to_current(app: &mut App, text: String, action: bool, now: u64) {
    if text.is_empty() {
        return;
    }
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    let chan_idx = server.current_channel;
    if server.channels[chan_idx].buffer_type == BufferType::Server {
        app.print_local("Can't send a message to the server tab, /join a channel first");
        return;
    }
    if server.channels[chan_idx].parted {
        app.print_local("You've left this channel, /join it again first");
        return;
    }

    let target = server.channels[chan_idx].name.display().to_owned();
    let line = if action {
        rirc_wire::action(&target, &text)
    } else {
        rirc_wire::privmsg(&target, &text)
    };
    if let Err(e) = server.send(&line) {
        server.push_error_line(chan_idx, format!("Can't send: {e}"), now);
        return;
    }

    let nick = server.nick().to_owned();
    let (sender, display) = if action {
        ("*".to_owned(), format!("{nick} {text}"))
    } else {
        (nick, text)
    };
    server.channels[chan_idx].push_line(BufferLine::new(now, sender, display, LineKind::Chat));
}

fn cmd_connect(app: &mut App, args: &str, now: u64) {
    let words: Vec<&str> = args.split_whitespace().collect();
    match words.len() {
        0 => app.engine.connect(app.current_server, now),
        1 | 2 => {
            let (host, port) = match words[0].split_once(':') {
                Some((h, p)) => match p.parse::<u16>() {
                    Ok(p) => (h.to_owned(), p),
                    Err(_) => {
                        app.print_local(&format!("connect: can't parse port '{p}'"));
                        return;
                    }
                },
                None => (words[0].to_owned(), 6667),
            };
            let idx = app.add_or_find_server(&host, port);
            app.current_server = idx;
            app.engine.connect(idx, now);
        }
        _ => app.print_local("/connect usage: /connect [host[:port]]"),
    }
}

fn cmd_disconnect(app: &mut App, args: &str, now: u64) {
    let reason = if args.is_empty() { None } else { Some(args) };
    app.engine.disconnect(app.current_server, reason, now);
}

fn cmd_quit(app: &mut App, args: &str, now: u64) {
    let reason = if args.is_empty() {
        Some(format!("rirc v{}", env!("CARGO_PKG_VERSION")))
    } else {
        Some(args.to_owned())
    };
    for idx in 0..app.engine.servers.len() {
        app.engine.disconnect(idx, reason.as_deref(), now);
    }
    app.quit = true;
}

fn cmd_join(app: &mut App, args: &str, now: u64) {
    let chan = args.trim();
    if chan.is_empty() {
        app.print_local("/join usage: /join <chan>");
        return;
    }
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    let chan = ChanName::new(chan.to_owned());
    if let Err(e) = server.send(&rirc_wire::join(std::iter::once(chan.as_ref()))) {
        server.push_error_line(0, format!("Can't join: {e}"), now);
    }
}

fn cmd_part(app: &mut App, args: &str, now: u64) {
    let reason = if args.is_empty() { None } else { Some(args) };
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    let chan_idx = server.current_channel;
    if server.channels[chan_idx].buffer_type != BufferType::Channel {
        app.print_local("Not in a channel");
        return;
    }
    if server.channels[chan_idx].parted {
        app.print_local("Already parted");
        return;
    }
    let chan_name = server.channels[chan_idx].name.clone();
    if let Err(e) = server.send(&rirc_wire::part(chan_name.as_ref(), reason)) {
        server.push_error_line(chan_idx, format!("Can't part: {e}"), now);
    }
}

fn cmd_nick(app: &mut App, args: &str, now: u64) {
    let new_nick = args.trim();
    if new_nick.is_empty() || !new_nick.chars().next().is_some_and(crate::utils::is_nick_first_char) {
        app.print_local("/nick usage: /nick <nick>");
        return;
    }
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    if server.is_connected() {
        if let Err(e) = server.send(&rirc_wire::nick(new_nick)) {
            server.push_error_line(0, format!("Can't change nick: {e}"), now);
        }
    } else {
        server.set_current_nick(new_nick);
    }
}

fn cmd_msg(app: &mut App, args: &str, now: u64) {
    let Some((target, text)) = args.split_once(' ') else {
        app.print_local("/msg usage: /msg <target> <text>");
        return;
    };
    if target.is_empty() || text.is_empty() {
        app.print_local("/msg usage: /msg <target> <text>");
        return;
    }
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    if let Err(e) = server.send(&rirc_wire::privmsg(target, text)) {
        server.push_error_line(0, format!("Can't send: {e}"), now);
        return;
    }
    let nick = server.nick().to_owned();
    let buffer_type = if target.starts_with(['#', '&', '+', '!']) {
        BufferType::Channel
    } else {
        BufferType::Private
    };
    let idx = server.channel_idx_or_create(ChanName::new(target.to_owned()).as_ref(), buffer_type);
    server.channels[idx].push_line(BufferLine::new(now, nick, text.to_owned(), LineKind::Chat));
}

fn cmd_ignore(app: &mut App, args: &str, now: u64, ignore: bool) {
    let nick = args.trim();
    if nick.is_empty() {
        app.print_local(if ignore {
            "/ignore usage: /ignore <nick>"
        } else {
            "/unignore usage: /unignore <nick>"
        });
        return;
    }
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    let lower = nick.to_ascii_lowercase();
    if ignore {
        server.ignore.insert(lower);
        server.push_system_line(0, format!("Ignoring {nick}"), now);
    } else {
        server.ignore.remove(&lower);
        server.push_system_line(0, format!("No longer ignoring {nick}"), now);
    }
}

fn cmd_raw(app: &mut App, args: &str, now: u64) {
    if args.is_empty() {
        app.print_local("/raw usage: /raw <irc line>");
        return;
    }
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    if let Err(e) = server.send(args) {
        server.push_error_line(0, format!("Can't send: {e}"), now);
    }
}

fn cmd_clear(app: &mut App) {
    let Some(server) = app.engine.servers.get_mut(app.current_server) else {
        return;
    };
    let chan_idx = server.current_channel;
    server.channels[chan_idx].scrollback.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_cmd_extracts_name_and_rest() {
        assert_eq!(split_cmd("join #foo"), ("join", "#foo"));
        assert_eq!(split_cmd("msg NickServ identify pw"), ("msg", "NickServ identify pw"));
        assert_eq!(split_cmd("clear"), ("clear", ""));
    }
}
