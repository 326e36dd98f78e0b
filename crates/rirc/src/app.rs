//! Front-end application state: owns the session engine plus the handful of fields the
//! line-oriented reference front end needs that the engine has no business knowing about (which
//! server is "current" for a bare chat line, whether the user asked to quit, and which scrollback
//! lines have already been printed to stdout).
//!
//! Collapsed into one struct since this front end has no terminal widgets to keep in sync with
//! the session engine.

use std::collections::HashMap;

use rirc_core::{Engine, ServerInfo};

pub(crate) struct App {
    pub(crate) engine: Engine,
    pub(crate) current_server: usize,
    pub(crate) quit: bool,
    default_nicks: Vec<String>,
    default_username: String,
    default_realname: String,
    /// Last `Channel::appended` value printed, per `(server index, channel index)`. Channel
    /// indices are stable for the lifetime of a run: channels are only ever appended to a
    /// server's ring, never removed.
    printed: HashMap<(usize, usize), u64>,
}

impl App {
    pub(crate) fn new(default_nicks: Vec<String>, default_username: String, default_realname: String) -> Self {
        App {
            engine: Engine::new(),
            current_server: 0,
            quit: false,
            default_nicks,
            default_username,
            default_realname,
            printed: HashMap::new(),
        }
    }

    pub(crate) fn print_local(&self, text: &str) {
        println!("-- {text}");
    }

    /// Used by `/connect <host[:port]>`: finds an already-registered
    /// server with this host, or registers a new one using the configured defaults.
    pub(crate) fn add_or_find_server(&mut self, host: &str, port: u16) -> usize {
        if let Some(idx) = self.engine.servers.iter().position(|s| s.info.host == host) {
            return idx;
        }
        self.engine.add_server(ServerInfo {
            host: host.to_owned(),
            port,
            tls: false,
            pass: None,
            username: self.default_username.clone(),
            realname: self.default_realname.clone(),
            nicks: self.default_nicks.clone(),
            auto_join: Vec::new(),
        })
    }

    /// Prints every scrollback line appended since the last call, across every server and
    /// channel, in `[name] sender text` form. Appended scrollback lines are the event the core
    /// produces for a front end to consume.
    pub(crate) fn flush_new_lines(&mut self) {
        for (s_idx, server) in self.engine.servers.iter().enumerate() {
            for (c_idx, chan) in server.channels.iter().enumerate() {
                let key = (s_idx, c_idx);
                let last = *self.printed.get(&key).unwrap_or(&0);
                let delta = chan.appended.saturating_sub(last) as usize;
                if delta == 0 {
                    continue;
                }
                // If more lines were appended than the ring can hold, only the surviving tail
                // is available to print; the rest were already evicted.
                let to_print = delta.min(chan.scrollback.len());
                let skip = chan.scrollback.len() - to_print;
                let pad = chan.nick_pad();
                for line in chan.scrollback.iter().skip(skip) {
                    println!(
                        "[{}] {:>pad$} {}",
                        chan.name.display(),
                        line.sender,
                        line.text,
                        pad = pad
                    );
                }
                self.printed.insert(key, chan.appended);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(vec!["bob".to_owned()], "bob".to_owned(), "Bob".to_owned())
    }

    #[test]
    fn add_or_find_reuses_existing_server_by_host() {
        let mut app = app();
        let a = app.add_or_find_server("irc.example.net", 6667);
        let b = app.add_or_find_server("irc.example.net", 6697);
        assert_eq!(a, b);
        assert_eq!(app.engine.servers.len(), 1);
    }

    #[test]
    fn add_or_find_registers_distinct_hosts_separately() {
        let mut app = app();
        let a = app.add_or_find_server("irc.example.net", 6667);
        let b = app.add_or_find_server("irc.other.net", 6667);
        assert_ne!(a, b);
        assert_eq!(app.engine.servers.len(), 2);
    }
}
