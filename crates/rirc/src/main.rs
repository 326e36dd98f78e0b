//! `rirc`: a line-oriented reference front end for the session engine in `rirc_core`.
//!
//! Terminal rendering, keyboard decoding, and the command-dispatch *table* (which key sends
//! which command) live outside the session engine; this binary is the minimal collaborator that
//! exercises it end to end without a real TUI: it reads commands from stdin and writes appended
//! buffer lines to stdout.

#![allow(clippy::zero_prefixed_literal)]

mod app;
mod cli;
mod commands;
mod config;
mod logging;
mod utils;

use std::io::{self, BufRead};
use std::path::Path;
use std::process::exit;
use std::sync::mpsc;
use std::time::Duration;

use rirc_common::ChanName;
use rirc_core::time::now_secs;
use rirc_core::ServerInfo;

use app::App;

const DEBUG_LOG_FILE: &str = "rirc_debug_logs.txt";

/// Called once per input-poll wake-up, roughly matching a UI frame cadence.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

fn main() {
    let args = cli::parse();
    let config_path = config::get_config_path();

    if config_path.is_dir() {
        eprintln!("The config path is a directory.");
        exit(1);
    }

    let (config_servers, defaults) = if config_path.is_file() {
        load_config(&config_path)
    } else if args.servers.is_empty() {
        // First run, no servers named on the command line either: generate a starter config
        // the user can edit.
        config::generate_default_config(&config_path);
        exit(0);
    } else {
        (
            Vec::new(),
            config::Defaults {
                nicks: vec!["rirc".to_owned()],
                realname: "rirc user".to_owned(),
            },
        )
    };

    let servers = build_servers(
        config_servers,
        &defaults,
        args.servers,
        args.nicks,
        args.username,
        args.realname,
    );

    if servers.is_empty() {
        eprintln!(
            "No servers configured. Use -s/--server, or add one to {}.",
            config_path.display()
        );
        exit(1);
    }

    logging::init(DEBUG_LOG_FILE.into());

    let mut app = App::new(defaults.nicks, "rirc".to_owned(), defaults.realname);
    for info in servers {
        app.engine.add_server(info);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(run(app));
}

fn load_config(config_path: &Path) -> (Vec<config::Server<String>>, config::Defaults) {
    let config = match config::parse_config(config_path) {
        Err(yaml_err) => {
            eprintln!("Can't parse config file:");
            eprintln!("{yaml_err}");
            exit(1);
        }
        Ok(config) => config,
    };

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!(
            "Config file error{}:",
            if errors.len() > 1 { "s" } else { "" }
        );
        for error in errors {
            eprintln!("- {error}");
        }
        exit(1);
    }

    let config = match config.read_passwords() {
        None => exit(1),
        Some(config) => config,
    };

    (config.servers, config.defaults)
}

/// Merges config-file servers with CLI `-s/-p/-j` occurrences: a CLI server matching a
/// config-file server's address overrides its port/auto-join; a CLI server with no config
/// match is appended.
fn build_servers(
    config_servers: Vec<config::Server<String>>,
    defaults: &config::Defaults,
    cli_servers: Vec<cli::ServerArgs>,
    cli_nicks: Vec<String>,
    cli_username: Option<String>,
    cli_realname: Option<String>,
) -> Vec<ServerInfo> {
    let mut servers: Vec<ServerInfo> = config_servers
        .into_iter()
        .map(|s| {
            let nicks = if cli_nicks.is_empty() { s.nicks } else { cli_nicks.clone() };
            let username = cli_username
                .clone()
                .or(s.user)
                .unwrap_or_else(|| nicks.first().cloned().unwrap_or_default());
            let realname = cli_realname.clone().unwrap_or(s.realname);
            ServerInfo {
                host: s.addr,
                port: s.port,
                tls: s.tls,
                pass: s.pass,
                username,
                realname,
                nicks,
                auto_join: s.join.into_iter().map(ChanName::new).collect(),
            }
        })
        .collect();

    for cli_server in cli_servers {
        match servers.iter_mut().find(|s| s.host == cli_server.host) {
            Some(existing) => {
                if let Some(port) = cli_server.port {
                    existing.port = port;
                }
                if !cli_server.join.is_empty() {
                    existing.auto_join = cli_server.join.into_iter().map(ChanName::new).collect();
                }
            }
            None => {
                let nicks = if cli_nicks.is_empty() { defaults.nicks.clone() } else { cli_nicks.clone() };
                let username = cli_username
                    .clone()
                    .unwrap_or_else(|| nicks.first().cloned().unwrap_or_default());
                let realname = cli_realname.clone().unwrap_or_else(|| defaults.realname.clone());
                servers.push(ServerInfo {
                    host: cli_server.host,
                    port: cli_server.port.unwrap_or(6667),
                    tls: false,
                    pass: None,
                    username,
                    realname,
                    nicks,
                    auto_join: cli_server.join.into_iter().map(ChanName::new).collect(),
                });
            }
        }
    }

    servers
}

async fn run(mut app: App) {
    let (input_tx, input_rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    for idx in 0..app.engine.servers.len() {
        app.engine.connect(idx, now_secs());
    }
    app.flush_new_lines();

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        interval.tick().await;
        let now = now_secs();

        while let Ok(line) = input_rx.try_recv() {
            commands::dispatch(&mut app, &line, now);
        }
        if app.quit {
            break;
        }

        app.engine.tick(now);
        app.flush_new_lines();

        if app.quit {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> config::Defaults {
        config::Defaults {
            nicks: vec!["defaultnick".to_owned()],
            realname: "Default Realname".to_owned(),
        }
    }

    #[test]
    fn cli_server_extends_empty_config() {
        let cli_servers = vec![cli::ServerArgs {
            host: "irc.example.net".to_owned(),
            port: Some(6697),
            join: vec!["#rust".to_owned()],
        }];
        let servers = build_servers(Vec::new(), &defaults(), cli_servers, Vec::new(), None, None);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].host, "irc.example.net");
        assert_eq!(servers[0].port, 6697);
        assert_eq!(servers[0].nicks, vec!["defaultnick".to_owned()]);
        assert_eq!(servers[0].auto_join[0].display(), "#rust");
    }

    #[test]
    fn cli_server_overrides_matching_config_server() {
        let config_servers = vec![config::Server {
            addr: "irc.example.net".to_owned(),
            port: 6667,
            tls: false,
            pass: None,
            user: None,
            realname: "cfg realname".to_owned(),
            nicks: vec!["cfgnick".to_owned()],
            join: vec!["#old".to_owned()],
        }];
        let cli_servers = vec![cli::ServerArgs {
            host: "irc.example.net".to_owned(),
            port: Some(6697),
            join: vec!["#new".to_owned()],
        }];
        let servers = build_servers(config_servers, &defaults(), cli_servers, Vec::new(), None, None);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].port, 6697);
        assert_eq!(servers[0].auto_join[0].display(), "#new");
        // Nicks/realname untouched by the CLI match since neither was explicitly overridden.
        assert_eq!(servers[0].nicks, vec!["cfgnick".to_owned()]);
    }

    #[test]
    fn cli_nick_list_overrides_every_server() {
        let config_servers = vec![config::Server {
            addr: "irc.example.net".to_owned(),
            port: 6667,
            tls: false,
            pass: None,
            user: None,
            realname: "cfg realname".to_owned(),
            nicks: vec!["cfgnick".to_owned()],
            join: vec![],
        }];
        let servers = build_servers(
            config_servers,
            &defaults(),
            Vec::new(),
            vec!["alice".to_owned(), "alice_".to_owned()],
            None,
            None,
        );
        assert_eq!(servers[0].nicks, vec!["alice".to_owned(), "alice_".to_owned()]);
    }
}
