//! Session engine: a single-threaded poller that advances every maintained server by one tick
//! (`spec.md` section 4.5).
//!
//! Grounded on the teacher's `libtiny_client::main_loop`, reshaped from a `select!`-driven
//! per-connection task into data a caller polls explicitly -- see `SPEC_FULL.md` section 5 for
//! why this is the one place HOW differs from the teacher rather than just WHAT.

use crate::connect::PendingConnect;
use crate::error::SessionError;
use crate::handlers;
use crate::server::{ConnState, ReadOutcome, Server, ServerInfo, HARD_TIMEOUT_SECS};

/// Owns the ring of all maintained servers and advances them on each call to [`Engine::tick`].
pub struct Engine {
    pub servers: Vec<Server>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Engine {
        Engine {
            servers: Vec::new(),
        }
    }

    /// Registers a new server in `Disconnected` state. Does not connect; call [`Engine::connect`]
    /// to start (`spec.md` section 4.4 transition table: "Disconnected -- user `connect` --
    /// Resolving").
    pub fn add_server(&mut self, info: ServerInfo) -> usize {
        self.servers.push(Server::new(info));
        self.servers.len() - 1
    }

    /// User-issued `/connect`: spawns the background connect worker and transitions
    /// `Disconnected -> Resolving`.
    pub fn connect(&mut self, idx: usize, now: u64) {
        let server = &self.servers[idx];
        let pending = PendingConnect::spawn(server.info.host.clone(), server.info.port, server.info.tls);
        self.servers[idx].begin_connect(pending, now);
    }

    /// User-issued `/disconnect [reason]`: cancels a pending connect attempt, or sends `QUIT` and
    /// closes a live connection. Never arms a reconnect.
    pub fn disconnect(&mut self, idx: usize, reason: Option<&str>, now: u64) {
        let server = &mut self.servers[idx];
        if server.has_pending() {
            server.cancel_pending(now);
        } else {
            server.user_disconnect(reason, now);
        }
    }

    /// Advances every server by one tick, in registration order (`spec.md` section 4.5 and
    /// section 5 "Ordering": "between servers, order is unspecified but stable within one tick").
    pub fn tick(&mut self, now: u64) {
        for idx in 0..self.servers.len() {
            self.tick_one(idx, now);
        }
    }

    fn tick_one(&mut self, idx: usize, now: u64) {
        // 1. Resolving: observe the pending connect handle.
        if self.servers[idx].state == ConnState::Resolving {
            self.poll_pending(idx, now);
            if self.servers[idx].state == ConnState::Resolving {
                // Still pending: skip liveness/reconnect/read for this server this tick.
                return;
            }
        }

        // 2. Connected/Pinging: evaluate liveness thresholds.
        if matches!(
            self.servers[idx].state,
            ConnState::Connected | ConnState::Pinging
        ) {
            if self.servers[idx].timed_out(now) {
                self.servers[idx]
                    .disconnect_with_error(&SessionError::PingTimeout(HARD_TIMEOUT_SECS), now);
            } else if let Some(ping) = self.servers[idx].evaluate_liveness(now) {
                self.try_send(idx, &ping);
            }
        }

        // 3. Backoff: reconnect once the timer has elapsed.
        if self.servers[idx].state == ConnState::Backoff {
            if let Some(t) = self.servers[idx].reconnect_time {
                if now >= t {
                    let server = &self.servers[idx];
                    let pending = PendingConnect::spawn(
                        server.info.host.clone(),
                        server.info.port,
                        server.info.tls,
                    );
                    self.servers[idx].begin_reconnect(pending, now);
                }
            }
        }

        // 4. Drain the socket if one is live.
        if matches!(
            self.servers[idx].state,
            ConnState::Connected | ConnState::Pinging
        ) {
            self.drain_socket(idx, now);
        }
    }

    fn poll_pending(&mut self, idx: usize, now: u64) {
        match self.servers[idx].poll_connect() {
            None => {}
            Some(Ok(outcome)) => {
                let lines = self.servers[idx].on_connected(outcome.stream, now);
                for line in lines {
                    self.try_send(idx, &line);
                }
            }
            Some(Err(e)) => {
                self.servers[idx].on_connect_failed(&e.to_string(), now);
            }
        }
    }

    fn drain_socket(&mut self, idx: usize, now: u64) {
        let outcome = match self.servers[idx].poll_read() {
            Ok(o) => o,
            Err(e) => {
                self.servers[idx].disconnect_with_error(&SessionError::Io(e), now);
                return;
            }
        };

        match outcome {
            ReadOutcome::NoStream | ReadOutcome::WouldBlock => {}
            ReadOutcome::Hangup => {
                self.servers[idx].disconnect_with_error(&SessionError::RemoteHangup, now);
            }
            ReadOutcome::Lines(lines) => self.process_lines(idx, lines, now),
            ReadOutcome::LinesAndOverflow(lines) => {
                self.process_lines(idx, lines, now);
                self.servers[idx].push_error_line(
                    0,
                    "receive buffer overflowed, dropping unterminated data".to_owned(),
                    now,
                );
            }
        }
    }

    fn process_lines(&mut self, idx: usize, lines: Vec<String>, now: u64) {
        for line in lines {
            self.servers[idx].note_inbound(now);
            match rirc_wire::parse(&line) {
                None => {
                    let err = SessionError::Protocol(line);
                    log::warn!("{} ({})", err, self.servers[idx].info.host);
                }
                Some(msg) => {
                    let out = handlers::dispatch(&mut self.servers[idx], msg, now);
                    for reply in out {
                        self.try_send(idx, &reply);
                    }
                }
            }
        }
    }

    fn try_send(&mut self, idx: usize, payload: &str) {
        if let Err(e) = self.servers[idx].send(payload) {
            log::warn!("send failed on {}: {e}", self.servers[idx].info.host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(host: &str) -> ServerInfo {
        ServerInfo {
            host: host.to_owned(),
            port: 6667,
            tls: false,
            pass: None,
            username: "rirc".to_owned(),
            realname: "rirc user".to_owned(),
            nicks: vec!["alice".to_owned()],
            auto_join: vec![],
        }
    }

    #[test]
    fn add_server_starts_disconnected_with_one_channel() {
        let mut engine = Engine::new();
        let idx = engine.add_server(info("irc.example.net"));
        assert_eq!(engine.servers[idx].state, ConnState::Disconnected);
        assert_eq!(engine.servers[idx].channels.len(), 1);
    }

    #[test]
    fn tick_on_idle_engine_is_a_no_op() {
        let mut engine = Engine::new();
        engine.add_server(info("irc.example.net"));
        engine.tick(0); // Disconnected servers are simply skipped.
        assert_eq!(engine.servers[0].state, ConnState::Disconnected);
    }
}
