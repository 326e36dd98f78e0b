//! Server session and connection state machine: data the [`crate::engine::Engine`] drives from
//! a polled `tick()` rather than a push-event task.

use std::collections::BTreeSet;
use std::io;

use rirc_common::limits::{BUFFSIZE, NICKSIZE};
use rirc_common::{ChanName, ChanNameRef, OrderedSet};
use rirc_wire::FormatError;

use crate::buffer::{pseudo_sender, BufferLine, BufferType, Channel, LineKind};
use crate::connect::{ConnectOutcome, PendingConnect};
use crate::error::ConnectError;
use crate::stream::Stream;

/// Liveness thresholds for the connection state machine's transition table.
pub const PING_THRESHOLD_SECS: u64 = 115;
pub const LATENCY_DISPLAY_SECS: u64 = 125;
pub const HARD_TIMEOUT_SECS: u64 = 255;

/// A timed-out connection is transient (it transitions straight to a scheduled reconnect), so
/// it is not represented as a resting state here -- entering it and entering `Backoff` are the
/// same assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Resolving,
    Connected,
    Pinging,
    Backoff,
}

/// Static identity of a server, known before any connection attempt.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub pass: Option<String>,
    pub username: String,
    pub realname: String,
    pub nicks: Vec<String>,
    pub auto_join: Vec<ChanName>,
}

/// One maintained connection to an IRC server: connection state machine, recv accumulator,
/// per-server ignore set, and the ring of channels it owns.
pub struct Server {
    pub info: ServerInfo,
    nick_idx: usize,
    /// Nick actually in use, once registration has started. Distinct from `nick_idx`'s
    /// configured-list position because `/nick` and server-confirmed `NICK` renames move this
    /// independently of the "try next configured nick" sequence.
    current_nick: String,
    pub usermodes: BTreeSet<char>,
    recv_buf: Vec<u8>,
    stream: Option<Stream>,
    pub ignore: OrderedSet<String>,
    /// Ring of channels this server owns. Index 0 is always the `Server`-typed buffer: exactly
    /// one channel in the ring has `buffer_type = Server`.
    pub channels: Vec<Channel>,
    pub current_channel: usize,
    pub latency_time: u64,
    pub latency_delta: Option<u64>,
    pub reconnect_time: Option<u64>,
    pub reconnect_delta: u64,
    pub pinging: bool,
    pending: Option<PendingConnect>,
    pub state: ConnState,
    /// Above this many nicks already in a channel, JOIN system lines are suppressed (the
    /// nick-set insert still happens). `0` disables suppression.
    pub join_part_quit_threshold: usize,
}

impl Server {
    pub fn new(info: ServerInfo) -> Server {
        let server_buf = Channel::new(ChanName::new(info.host.clone()), BufferType::Server);
        Server {
            nick_idx: 0,
            current_nick: String::new(),
            usermodes: BTreeSet::new(),
            recv_buf: Vec::with_capacity(BUFFSIZE),
            stream: None,
            ignore: OrderedSet::new(),
            channels: vec![server_buf],
            current_channel: 0,
            latency_time: 0,
            latency_delta: None,
            reconnect_time: None,
            reconnect_delta: 0,
            pinging: false,
            pending: None,
            state: ConnState::Disconnected,
            join_part_quit_threshold: 0,
            info,
        }
    }

    /// Current nick, bounded to [`NICKSIZE`]. Empty until the first entry of `info.nicks` is
    /// tried (`spec.md` section 3: "nick iterator pointing into the configured nick-list").
    pub fn nick(&self) -> &str {
        &self.current_nick
    }

    /// Applies a confirmed or user-requested nick change (`spec.md` section 4.4 "NICK").
    pub fn set_current_nick(&mut self, nick: impl Into<String>) {
        self.current_nick = rirc_common::limits::truncate_to(&nick.into(), NICKSIZE);
    }

    /// Advances to the next configured nick on a 433 (ERR_NICKNAMEINUSE). Returns the new nick,
    /// or `None` if every configured nick has been tried.
    pub fn try_next_nick(&mut self) -> Option<&str> {
        if self.nick_idx + 1 < self.info.nicks.len() {
            self.nick_idx += 1;
            self.current_nick = self.info.nicks[self.nick_idx].clone();
            Some(&self.current_nick)
        } else {
            None
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn server_channel(&self) -> &Channel {
        &self.channels[0]
    }

    pub fn server_channel_mut(&mut self) -> &mut Channel {
        &mut self.channels[0]
    }

    pub fn find_channel_mut(&mut self, name: &ChanNameRef) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.name.as_ref() == name)
    }

    pub fn find_channel(&self, name: &ChanNameRef) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name.as_ref() == name)
    }

    /// Returns the index of the channel named `name`, creating it (as `buffer_type`) if absent.
    pub fn channel_idx_or_create(&mut self, name: &ChanNameRef, buffer_type: BufferType) -> usize {
        if let Some(idx) = self.channels.iter().position(|c| c.name.as_ref() == name) {
            return idx;
        }
        self.channels.push(Channel::new(name.to_owned(), buffer_type));
        self.channels.len() - 1
    }

    pub fn push_server_line(&mut self, sender: &str, text: impl Into<String>, now: u64) {
        self.channels[0].push_line(BufferLine::new(now, sender, text, LineKind::Default));
    }

    pub fn push_system_line(&mut self, chan_idx: usize, text: impl Into<String>, now: u64) {
        self.channels[chan_idx].push_line(BufferLine::new(
            now,
            pseudo_sender::INFO,
            text,
            LineKind::Default,
        ));
    }

    pub fn push_error_line(&mut self, chan_idx: usize, text: impl Into<String>, now: u64) {
        self.channels[chan_idx].push_line(BufferLine::new(
            now,
            pseudo_sender::ERROR,
            text,
            LineKind::Default,
        ));
    }

    // -- Connection state transitions (`spec.md` section 4.4) --------------------------------

    /// User-issued `/connect`: `Disconnected -> Resolving`.
    pub fn begin_connect(&mut self, pending: PendingConnect, now: u64) {
        self.state = ConnState::Resolving;
        self.reconnect_time = None;
        self.push_system_line(
            0,
            format!("Connecting to {}:{}", self.info.host, self.info.port),
            now,
        );
        self.pending = Some(pending);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Non-blocking poll of the connect worker. Returns `Some` exactly once, the first tick
    /// after the worker publishes a result; the pending handle is dropped at that point.
    pub fn poll_connect(&mut self) -> Option<Result<ConnectOutcome, ConnectError>> {
        let result = self.pending.as_ref()?.poll();
        if result.is_some() {
            self.pending = None;
        }
        result
    }

    /// `Resolving -> Connected`: installs the live socket, resets liveness/reconnect state, and
    /// sends the registration sequence. Returns the lines to transmit (PASS/NICK/USER).
    pub fn on_connected(&mut self, stream: Stream, now: u64) -> Vec<String> {
        self.stream = Some(stream);
        self.state = ConnState::Connected;
        self.pinging = false;
        self.latency_time = now;
        self.latency_delta = None;
        self.reconnect_time = None;
        self.reconnect_delta = 0;
        self.nick_idx = 0;
        self.current_nick = self.info.nicks.first().cloned().unwrap_or_default();

        let mut out = Vec::new();
        if let Some(pass) = &self.info.pass {
            out.push(rirc_wire::pass(pass));
        }
        out.push(rirc_wire::nick(self.nick()));
        out.push(rirc_wire::user(&self.info.username, &self.info.realname));
        out
    }

    /// `Resolving -> Backoff` (or `Disconnected` if auto-reconnect was never armed): a connect
    /// attempt failed. `spec.md` section 9 "Open question": the first back-off delta is always
    /// 15s; doubling applies only to *subsequent* consecutive failures.
    pub fn on_connect_failed(&mut self, message: &str, now: u64) {
        self.push_error_line(0, message.to_owned(), now);
        self.schedule_backoff(now);
    }

    fn schedule_backoff(&mut self, now: u64) {
        self.reconnect_delta = if self.reconnect_delta == 0 {
            rirc_common::limits::RECONNECT_DELTA
        } else {
            self.reconnect_delta * 2
        };
        self.reconnect_time = Some(now + self.reconnect_delta);
        self.state = ConnState::Backoff;
    }

    /// `Backoff -> Resolving`: the engine calls this once `now >= reconnect_time`.
    pub fn begin_reconnect(&mut self, pending: PendingConnect, now: u64) {
        self.state = ConnState::Resolving;
        self.push_system_line(
            0,
            format!("Reconnecting to {}:{}", self.info.host, self.info.port),
            now,
        );
        self.pending = Some(pending);
    }

    /// Evaluates liveness thresholds for a `Connected`/`Pinging` server. Returns a `PING` line to
    /// send, if the threshold was just crossed.
    pub fn evaluate_liveness(&mut self, now: u64) -> Option<String> {
        let delta = now.saturating_sub(self.latency_time);
        match self.state {
            ConnState::Connected if delta > PING_THRESHOLD_SECS && !self.pinging => {
                self.pinging = true;
                self.state = ConnState::Pinging;
                Some(rirc_wire::ping(&format!(":{}", self.info.host)))
            }
            ConnState::Pinging if delta > LATENCY_DISPLAY_SECS => {
                self.latency_delta = Some(delta);
                None
            }
            _ => None,
        }
    }

    /// Returns `true` if the hard 255s timeout has elapsed and the server should be disconnected
    /// with `PingTimeout`.
    pub fn timed_out(&self, now: u64) -> bool {
        matches!(self.state, ConnState::Connected | ConnState::Pinging)
            && now.saturating_sub(self.latency_time) > HARD_TIMEOUT_SECS
    }

    /// Inbound traffic resets liveness tracking (`spec.md` section 4.4 "Receive loop").
    pub fn note_inbound(&mut self, now: u64) {
        self.latency_time = now;
        self.latency_delta = None;
        self.pinging = false;
        if self.state == ConnState::Pinging {
            self.state = ConnState::Connected;
        }
    }

    /// `Connected`/`Pinging` -> `Backoff`: remote hangup, I/O error, or ping timeout.
    /// Per `spec.md` section 4.4 "On entering Disconnected from Connected": every channel gets a
    /// `"(disconnected)"` line, nick sets/counts are cleared, `parted` is cleared, scrollback is
    /// preserved. Takes the concrete `SessionError` that caused the disconnect (`spec.md` section
    /// 7) rather than an ad hoc message string.
    pub fn disconnect_with_error(&mut self, err: &crate::error::SessionError, now: u64) {
        self.stream = None;
        for chan in self.channels.iter_mut() {
            chan.push_line(BufferLine::new(
                now,
                pseudo_sender::ERROR,
                "(disconnected)",
                LineKind::Default,
            ));
            chan.reset_on_disconnect();
        }
        self.push_error_line(0, err.to_string(), now);
        self.schedule_backoff(now);
    }

    /// User-issued `/disconnect [reason]` or `/quit [reason]` while connected: sends `QUIT`,
    /// closes the socket, and does *not* arm a reconnect.
    pub fn user_disconnect(&mut self, reason: Option<&str>, now: u64) {
        if self.is_connected() {
            let _ = self.send(&rirc_wire::quit(reason));
        }
        self.stream = None;
        self.state = ConnState::Disconnected;
        self.reconnect_time = None;
        self.reconnect_delta = 0;
        for chan in self.channels.iter_mut() {
            chan.reset_on_disconnect();
        }
        self.push_system_line(0, "Disconnected", now);
    }

    /// User-issued disconnect while a connect attempt is still pending: cancels the worker.
    pub fn cancel_pending(&mut self, now: u64) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
        self.state = ConnState::Disconnected;
        self.reconnect_time = None;
        self.reconnect_delta = 0;
        self.push_system_line(0, "Cancelled", now);
    }

    // -- I/O -----------------------------------------------------------------------------------

    /// Non-blocking read into the accumulator, scanning for complete lines
    /// (`spec.md` section 4.4 "Receive loop").
    pub fn poll_read(&mut self) -> io::Result<ReadOutcome> {
        let stream = match self.stream.as_mut() {
            Some(s) => s,
            None => return Ok(ReadOutcome::NoStream),
        };

        let mut chunk = [0u8; BUFFSIZE];
        match stream.try_read(&mut chunk) {
            Ok(0) => Ok(ReadOutcome::Hangup),
            Ok(n) => {
                self.recv_buf.extend_from_slice(&chunk[..n]);
                let lines = self.drain_lines();
                if self.recv_buf.len() >= BUFFSIZE {
                    self.recv_buf.clear();
                    Ok(ReadOutcome::LinesAndOverflow(lines))
                } else {
                    Ok(ReadOutcome::Lines(lines))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }

    /// Scans the accumulator for CR/LF-terminated lines, draining completed ones and collapsing
    /// a `\r\n` pair into a single terminator (`spec.md`: "accept `\r\n`, `\n`, or `\r`"). Leaves
    /// any trailing partial line in the accumulator for the next read.
    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let term = self
                .recv_buf
                .iter()
                .position(|&b| b == b'\r' || b == b'\n');
            let Some(idx) = term else { break };

            let terminator = self.recv_buf[idx];
            let line: Vec<u8> = self.recv_buf.drain(..idx).collect();
            self.recv_buf.remove(0); // the terminator byte itself
            if terminator == b'\r' && self.recv_buf.first() == Some(&b'\n') {
                self.recv_buf.remove(0); // collapse the \n half of a \r\n pair
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Formats and transmits one outgoing line (`spec.md` section 4.2 `sendf`).
    pub fn send(&mut self, payload: &str) -> Result<(), FormatError> {
        let line = rirc_wire::format_line(self.is_connected(), payload)?;
        if line.is_empty() {
            return Ok(());
        }
        let stream = self.stream.as_mut().ok_or(FormatError::NotConnected)?;
        match stream.try_write(line.as_bytes()) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(_) => Err(FormatError::NotConnected),
        }
    }
}

pub enum ReadOutcome {
    NoStream,
    WouldBlock,
    Hangup,
    Lines(Vec<String>),
    /// Lines found before the accumulator filled past [`BUFFSIZE`] without a terminator; the
    /// buffer has already been dropped (`spec.md`: "drop the buffer and emit a warning line
    /// ... do not drop the connection").
    LinesAndOverflow(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ServerInfo {
        ServerInfo {
            host: "irc.example.net".to_owned(),
            port: 6667,
            tls: false,
            pass: None,
            username: "rirc".to_owned(),
            realname: "rirc user".to_owned(),
            nicks: vec!["alice".to_owned(), "alice_".to_owned(), "alice__".to_owned()],
            auto_join: vec![],
        }
    }

    #[test]
    fn exactly_one_server_channel() {
        let server = Server::new(info());
        assert_eq!(server.channels.len(), 1);
        assert_eq!(server.server_channel().buffer_type, BufferType::Server);
    }

    #[test]
    fn nick_collision_tries_next_configured_nick() {
        let mut server = Server::new(info());
        server.set_current_nick("alice");
        assert_eq!(server.nick(), "alice");
        assert_eq!(server.try_next_nick(), Some("alice_"));
        assert_eq!(server.nick(), "alice_");
        assert_eq!(server.try_next_nick(), Some("alice__"));
        assert_eq!(server.try_next_nick(), None);
        assert_eq!(server.nick(), "alice__");
    }

    #[test]
    fn backoff_doubles_on_consecutive_failures() {
        let mut server = Server::new(info());
        server.on_connect_failed("could not resolve host", 0);
        assert_eq!(server.reconnect_delta, 15);
        server.state = ConnState::Resolving;
        server.on_connect_failed("connection refused", 100);
        assert_eq!(server.reconnect_delta, 30);
        server.state = ConnState::Resolving;
        server.on_connect_failed("connection refused", 200);
        assert_eq!(server.reconnect_delta, 60);
    }

    #[test]
    fn drain_lines_accepts_cr_lf_and_bare_cr_or_lf() {
        let mut server = Server::new(info());
        server.recv_buf.extend_from_slice(b"PING :a\r\nPING :b\nPING :c\r");
        let lines = server.drain_lines();
        assert_eq!(lines, vec!["PING :a", "PING :b", "PING :c"]);
        assert!(server.recv_buf.is_empty());
    }

    #[test]
    fn overflow_without_terminator_drops_buffer() {
        let mut server = Server::new(info());
        server.recv_buf.extend(std::iter::repeat(b'x').take(BUFFSIZE));
        let lines = server.drain_lines();
        assert!(lines.is_empty());
        assert!(server.recv_buf.len() >= BUFFSIZE);
    }

    #[test]
    fn ping_sent_after_threshold_then_timeout_schedules_backoff() {
        let mut server = Server::new(info());
        server.state = ConnState::Connected;
        server.latency_time = 0;
        assert!(server.evaluate_liveness(50).is_none());
        let ping = server.evaluate_liveness(116);
        assert!(ping.is_some());
        assert_eq!(server.state, ConnState::Pinging);
        assert!(!server.timed_out(200));
        assert!(server.timed_out(257));
    }
}
