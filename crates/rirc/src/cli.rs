//! Command line argument parsing: a hand-rolled `std::env::args()` scanner rather than a
//! `clap`/`argh` dependency, since the surface here is small.

/// One `-s/--server` occurrence and the flags that follow it until the next `-s`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ServerArgs {
    pub(crate) host: String,
    pub(crate) port: Option<u16>,
    pub(crate) join: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Args {
    pub(crate) servers: Vec<ServerArgs>,
    pub(crate) nicks: Vec<String>,
    pub(crate) username: Option<String>,
    pub(crate) realname: Option<String>,
}

/// Parses command line arguments and handles `--version`/`--help` by exiting directly.
pub(crate) fn parse() -> Args {
    let mut args_out = Args::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-s" | "--server" => {
                let host = require_value(&mut args, &arg);
                args_out.servers.push(ServerArgs {
                    host,
                    ..Default::default()
                });
            }
            "-p" | "--port" => {
                let value = require_value(&mut args, &arg);
                let port: u16 = value.parse().unwrap_or_else(|_| {
                    eprintln!("Error: '--port' expects a number, got '{value}'");
                    std::process::exit(1);
                });
                match args_out.servers.last_mut() {
                    Some(server) => server.port = Some(port),
                    None => usage_error("'--port' must follow a '-s/--server'"),
                }
            }
            "-j" | "--join" => {
                let value = require_value(&mut args, &arg);
                let chans = value.split(',').map(str::to_owned).collect::<Vec<_>>();
                match args_out.servers.last_mut() {
                    Some(server) => server.join = chans,
                    None => usage_error("'--join' must follow a '-s/--server'"),
                }
            }
            "-n" | "--nick" => {
                let value = require_value(&mut args, &arg);
                args_out.nicks = value.split(',').map(str::to_owned).collect();
            }
            "-u" | "--username" => {
                args_out.username = Some(require_value(&mut args, &arg));
            }
            "-r" | "--realname" => {
                args_out.realname = Some(require_value(&mut args, &arg));
            }
            other => {
                eprintln!("Error: Found argument '{other}' which wasn't expected");
                eprintln!();
                eprintln!("For more information try --help");
                std::process::exit(1);
            }
        }
    }

    args_out
}

fn require_value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    args.next().unwrap_or_else(|| {
        usage_error(&format!("'{flag}' requires a value but none was supplied"));
        unreachable!()
    })
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!();
    eprintln!("For more information try --help");
    std::process::exit(1);
}

fn print_version() {
    println!("rirc {}", env!("CARGO_PKG_VERSION"));
}

fn print_help() {
    print_version();
    println!(
        "\
{}
{}

USAGE:
    rirc [OPTIONS]

OPTIONS:
    -s, --server=HOST         Connect to HOST (repeatable)
    -p, --port=PORT           Port for the preceding -s (default 6667, or 6697 with TLS configured)
    -j, --join=CHAN[,CHAN]    Channels to auto-join on the preceding -s
    -n, --nick=CSV            Comma-separated nicks to try in order
    -u, --username=NAME       Username for connection registration
    -r, --realname=NAME       Real name for connection registration
    -v, --version             Print version information
    -h, --help                Print help information

Servers may also come from the config file; CLI-specified servers are added to it.",
        env!("CARGO_PKG_AUTHORS"),
        env!("CARGO_PKG_DESCRIPTION"),
    )
}
