//! YAML configuration file: `$XDG_CONFIG_HOME/rirc/config.yml` falling back to
//! `$HOME/.rircrc.yml`, server presets plus defaults, a `PassOrCmd` password-or-shell-command
//! field, and a `validate()` pre-flight pass before connecting. SASL and NickServ-ident fields
//! are out of scope: services semantics beyond passing them through as ordinary messages are
//! not handled here.

use serde::{Deserialize, Deserializer};

use std::fs;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Clone, Deserialize)]
pub(crate) struct Server<P> {
    /// Address of the server.
    pub(crate) addr: String,

    /// Port of the server.
    #[serde(default = "default_port")]
    pub(crate) port: u16,

    /// Use TLS.
    #[serde(default)]
    pub(crate) tls: bool,

    /// Server password (optional).
    #[serde(default)]
    pub(crate) pass: Option<P>,

    /// User name to be used in connection registration. Defaults to the first nick if absent.
    #[serde(default)]
    pub(crate) user: Option<String>,

    /// Real name to be used in connection registration.
    #[serde(deserialize_with = "deser_trimmed_str")]
    pub(crate) realname: String,

    /// Nicks to try when connecting, tried in order on 433 collisions.
    #[serde(deserialize_with = "deser_trimmed_str_vec")]
    pub(crate) nicks: Vec<String>,

    /// Channels to automatically join.
    #[serde(default)]
    pub(crate) join: Vec<String>,
}

fn default_port() -> u16 {
    6667
}

/// Similar to `Server`, but used as a baseline for `/connect`-initiated servers not named in the
/// config file.
#[derive(Clone, Deserialize)]
pub(crate) struct Defaults {
    #[serde(deserialize_with = "deser_trimmed_str_vec")]
    pub(crate) nicks: Vec<String>,
    #[serde(deserialize_with = "deser_trimmed_str")]
    pub(crate) realname: String,
}

#[derive(Deserialize)]
pub(crate) struct Config<P> {
    #[serde(default)]
    pub(crate) servers: Vec<Server<P>>,
    pub(crate) defaults: Defaults,
    #[serde(default)]
    pub(crate) log_dir: Option<PathBuf>,
}

fn deser_trimmed_str<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let str = String::deserialize(d)?;
    Ok(str.trim().to_owned())
}

fn deser_trimmed_str_vec<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let strs: Vec<String> = Vec::deserialize(d)?;
    Ok(strs.into_iter().map(|s| s.trim().to_owned()).collect())
}

/// A password, or a shell command to run to obtain one. Generically useful, not IRC-specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PassOrCmd {
    Pass(String),
    Cmd(Vec<String>),
}

impl PassOrCmd {
    fn is_empty_cmd(&self) -> bool {
        match self {
            PassOrCmd::Cmd(cmd) => cmd.is_empty(),
            PassOrCmd::Pass(_) => false,
        }
    }
}

impl<'de> Deserialize<'de> for PassOrCmd {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        use serde_yaml::Value;

        match Value::deserialize(deserializer)? {
            Value::String(str) => Ok(PassOrCmd::Pass(str)),
            Value::Mapping(map) => match map.get(Value::String("command".to_owned())) {
                Some(Value::String(cmd)) => match shell_words::split(cmd) {
                    Ok(cmd_parts) => Ok(PassOrCmd::Cmd(cmd_parts)),
                    Err(err) => Err(D::Error::custom(format!(
                        "Unable to parse password field: {err}"
                    ))),
                },
                _ => Err(D::Error::custom(
                    "Expected a 'command' key in password map with string value",
                )),
            },
            _ => Err(D::Error::custom("Password field must be a string or map")),
        }
    }
}

fn run_command(command_name: &str, server_addr: &str, args: &[String]) -> Option<String> {
    println!(
        "Running {} command for {} (`{}`)",
        command_name,
        server_addr,
        shell_words::join(args)
    );

    let mut cmd = Command::new(&args[0]);
    cmd.args(&args[1..]);

    let output = match cmd.output() {
        Err(err) => {
            println!("Command failed: {err:?}");
            return None;
        }
        Ok(output) => output,
    };

    if !output.status.success() {
        println!("Command returned non-zero exit status");
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    stdout.lines().last().map(str::to_owned)
}

impl Config<PassOrCmd> {
    /// Returns error descriptions; an empty vec means the config is usable.
    pub(crate) fn validate(&self) -> Vec<String> {
        let mut errors = vec![];

        if self.defaults.nicks.is_empty() {
            errors.push(
                "Default nick list can't be empty, please add at least one default nick".to_owned(),
            );
        }

        if self.defaults.realname.is_empty() {
            errors.push(
                "realname can't be empty, please update 'realname' field of 'defaults'".to_owned(),
            );
        }

        for server in &self.servers {
            if server.nicks.is_empty() {
                errors.push(format!(
                    "Nick list for server '{}' is empty, please add at least one nick",
                    server.addr
                ));
            }
            for (nick_idx, nick) in server.nicks.iter().enumerate() {
                if nick.is_empty() {
                    errors.push(format!(
                        "Nicks can't be empty, please update nick {nick_idx} for '{}'",
                        server.addr
                    ));
                }
            }
            if server.realname.is_empty() {
                errors.push(format!(
                    "'realname' can't be empty, please update 'realname' field of '{}'",
                    server.addr
                ));
            }
            if let Some(pass) = &server.pass {
                if pass.is_empty_cmd() {
                    errors.push(format!("Empty PASS command for '{}'", server.addr));
                }
            }
        }

        errors
    }

    /// Runs any password commands and replaces them with the plain passwords obtained.
    pub(crate) fn read_passwords(self) -> Option<Config<String>> {
        let Config {
            servers,
            defaults,
            log_dir,
        } = self;

        let mut servers_: Vec<Server<String>> = Vec::with_capacity(servers.len());
        for server in servers {
            let Server {
                addr,
                port,
                tls,
                pass,
                user,
                realname,
                nicks,
                join,
            } = server;

            let pass = match pass {
                None => None,
                Some(PassOrCmd::Pass(pass)) => Some(pass),
                Some(PassOrCmd::Cmd(cmd)) => Some(run_command("server password", &addr, &cmd)?),
            };

            servers_.push(Server {
                addr,
                port,
                tls,
                pass,
                user,
                realname,
                nicks,
                join,
            });
        }

        Some(Config {
            servers: servers_,
            defaults,
            log_dir,
        })
    }
}

/// Returns the rirc config file path. The file may or may not exist yet.
///
/// Places to look, in priority order:
/// - `$XDG_CONFIG_HOME/rirc/config.yml`
/// - `$HOME/.rircrc.yml` (fallback, for systems without `$XDG_CONFIG_HOME`)
///
/// Panics when neither `$XDG_CONFIG_HOME` nor `$HOME` can be found (via the `dirs` crate).
pub(crate) fn get_config_path() -> PathBuf {
    let xdg_config_path = dirs::config_dir().map(|mut xdg_config_home| {
        xdg_config_home.push("rirc");
        let _ = fs::create_dir_all(&xdg_config_home);
        xdg_config_home.push("config.yml");
        xdg_config_home
    });

    let home_config_path = dirs::home_dir().map(|mut home_dir| {
        home_dir.push(".rircrc.yml");
        home_dir
    });

    match (xdg_config_path, home_config_path) {
        (Some(xdg_config_path), _) if xdg_config_path.exists() => xdg_config_path,
        (_, Some(home_config_path)) if home_config_path.exists() => home_config_path,
        (Some(xdg_config_path), _) => xdg_config_path,
        (_, Some(home_config_path)) => home_config_path,
        (None, None) => {
            panic!(
                "Can't read $HOME or $XDG_CONFIG_HOME environment variables, \
                 please consider setting at least one of these variables"
            );
        }
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match shellexpand::full(&s) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(err) => {
            println!("Failed to expand path {path:?}: {err}");
            path.to_owned()
        }
    }
}

pub(crate) fn parse_config(config_path: &Path) -> Result<Config<PassOrCmd>, serde_yaml::Error> {
    let contents = {
        let mut str = String::new();
        let mut file = File::open(config_path).unwrap();
        file.read_to_string(&mut str).unwrap();
        str
    };

    let mut config: Config<PassOrCmd> = serde_yaml::from_str(&contents)?;
    if let Some(log_dir) = &mut config.log_dir {
        *log_dir = expand_path(log_dir);
    }
    Ok(config)
}

pub(crate) fn generate_default_config(config_path: &Path) {
    if let Some(parent) = config_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut file = File::create(config_path).unwrap();
    file.write_all(default_config_yaml().as_bytes()).unwrap();
    println!(
        "rirc couldn't find a config file at {config_path:?}, and created one with defaults.\n\
         You may want to edit {config_path:?} before re-running rirc."
    );
}

fn default_config_yaml() -> String {
    let mut log_dir = dirs::home_dir().unwrap();
    log_dir.push("rirc_logs");
    format!(include_str!("../config.yml"), log_dir.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_config() {
        match serde_yaml::from_str::<Config<String>>(&default_config_yaml()) {
            Err(yaml_err) => panic!("{yaml_err}"),
            Ok(Config { servers, .. }) => {
                assert_eq!(servers[0].join, vec!["#rirc".to_owned()]);
                assert!(servers[0].tls);
            }
        }
    }

    #[test]
    fn validation_catches_empty_required_fields() {
        let config = Config {
            servers: vec![Server {
                addr: "my_server".to_owned(),
                port: 6667,
                tls: false,
                pass: None,
                user: None,
                realname: "".to_owned(),
                nicks: vec!["".to_owned()],
                join: vec![],
            }],
            defaults: Defaults {
                nicks: vec!["".to_owned()],
                realname: "".to_owned(),
            },
            log_dir: None,
        };

        let errors = config.validate();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn parse_config_expands_log_dir() {
        let home = std::env::var("HOME").unwrap();
        let yaml = "\
servers:
  - addr: irc.test.com
    port: 6697
    tls: true
    realname: test
    nicks: [test]
    join: []
defaults:
  nicks: [test]
  realname: test
log_dir: ~/test_logs
";
        let dir = std::env::temp_dir().join("rirc_test_parse_config");
        let _ = fs::create_dir_all(&dir);
        let config_path = dir.join("config.yml");
        fs::write(&config_path, yaml).unwrap();

        let config = parse_config(&config_path).unwrap();
        assert_eq!(
            config.log_dir.unwrap(),
            PathBuf::from(format!("{home}/test_logs"))
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parse_password_field() {
        let field = "command: my pass cmd";
        assert_eq!(
            serde_yaml::from_str::<PassOrCmd>(field).unwrap(),
            PassOrCmd::Cmd(vec!["my".to_owned(), "pass".to_owned(), "cmd".to_owned()])
        );

        let field = "my password";
        assert_eq!(
            serde_yaml::from_str::<PassOrCmd>(field).unwrap(),
            PassOrCmd::Pass(field.to_string())
        );
    }

    #[test]
    fn expand_path_tilde() {
        let home = std::env::var("HOME").unwrap();
        let expanded = expand_path(Path::new("~/foo"));
        assert_eq!(expanded, PathBuf::from(format!("{home}/foo")));
    }
}
