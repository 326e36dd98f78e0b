//! Cross-component tests exercising `Server`, `handlers::dispatch` and `Engine` together, the
//! way the teacher's `libtiny_tui::tests` module exercises multiple widgets at once rather than
//! one module in isolation (`SPEC_FULL.md` section 8).

use rirc_common::ChanName;

use crate::buffer::BufferType;
use crate::engine::Engine;
use crate::server::{ConnState, ServerInfo};

fn info(host: &str, auto_join: &[&str]) -> ServerInfo {
    ServerInfo {
        host: host.to_owned(),
        port: 6667,
        tls: false,
        pass: None,
        username: "rirc".to_owned(),
        realname: "rirc user".to_owned(),
        nicks: vec!["alice".to_owned(), "alice_".to_owned()],
        auto_join: auto_join.iter().map(|c| ChanName::new((*c).to_owned())).collect(),
    }
}

/// Registration through 001 hands back the configured auto-join channels, a nick collision on
/// 433 advances to the next configured nick, and a NAMES reply populates the resulting channel's
/// nick set -- the full `spec.md` section 4.4 "first contact" sequence in one pass, without a
/// real socket.
#[test]
fn registration_nick_retry_then_auto_join_then_names() {
    let mut engine = Engine::new();
    let idx = engine.add_server(info("irc.example.net", &["#rirc"]));
    let server = &mut engine.servers[idx];
    server.set_current_nick("alice");

    let retry = rirc_wire::parse(":irc.example.net 433 * alice :Nickname is already in use").unwrap();
    let out = crate::handlers::dispatch(server, retry, 0);
    assert_eq!(out, vec!["NICK alice_".to_owned()]);
    assert_eq!(server.nick(), "alice_");

    let welcome = rirc_wire::parse(":irc.example.net 001 alice_ :Welcome").unwrap();
    let out = crate::handlers::dispatch(server, welcome, 0);
    assert_eq!(out, vec!["JOIN #rirc".to_owned()]);

    let names = rirc_wire::parse(":irc.example.net 353 alice_ = #rirc :@alice_ +bob carol").unwrap();
    crate::handlers::dispatch(server, names, 0);

    let chan_idx = server
        .channels
        .iter()
        .position(|c| c.name.display() == "#rirc")
        .unwrap();
    assert_eq!(server.channels[chan_idx].buffer_type, BufferType::Channel);
    assert_eq!(server.channels[chan_idx].nick_count(), 3);
    assert!(server.channels[chan_idx].nicks.contains("bob"));
}

/// A fresh server starts `Disconnected` with only its server buffer, and disconnecting before
/// any connect attempt is a no-op rather than a panic (`spec.md` section 4.4 transition table).
#[test]
fn engine_disconnect_before_connect_is_harmless() {
    let mut engine = Engine::new();
    let idx = engine.add_server(info("irc.example.net", &[]));
    assert_eq!(engine.servers[idx].state, ConnState::Disconnected);
    assert_eq!(engine.servers[idx].channels.len(), 1);

    engine.disconnect(idx, Some("bye"), 0);
    assert_eq!(engine.servers[idx].state, ConnState::Disconnected);
}

/// PART after JOIN clears the nick from the channel and marks it parted, while the channel
/// itself (and its scrollback) survives -- channels are never removed, only parted
/// (`spec.md` section 3 "Ownership").
#[test]
fn join_then_part_marks_parted_without_dropping_channel() {
    let mut engine = Engine::new();
    let idx = engine.add_server(info("irc.example.net", &[]));
    let server = &mut engine.servers[idx];
    server.set_current_nick("alice");

    let join = rirc_wire::parse(":alice!a@h JOIN :#rust").unwrap();
    crate::handlers::dispatch(server, join, 0);
    let chan_idx = server
        .channels
        .iter()
        .position(|c| c.name.display() == "#rust")
        .unwrap();
    assert!(!server.channels[chan_idx].parted);

    let part = rirc_wire::parse(":alice!a@h PART #rust :done").unwrap();
    crate::handlers::dispatch(server, part, 1);
    assert!(server.channels[chan_idx].parted);
    assert_eq!(server.channels[chan_idx].nick_count(), 0);
    assert_eq!(server.channels.len(), 2); // server buffer + #rust, not removed
}
