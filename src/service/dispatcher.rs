//! Dispatcher launcher

use std::{net::SocketAddr, process::ExitCode};

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{debug, error, info, LevelFilter};
use shapeshifter_ipc::{
    env::{Environment, EXIT_ON_STDIN_CLOSE},
    ClientConfig,
    ClientSettings,
    Messenger,
    ProcessEnvironment,
    Role,
    ServerConfig,
    ServerSettings,
};
use shapeshifter_service::{
    launch_client,
    launch_server,
    scrub,
    ClientLaunch,
    ConnectionTracker,
    ProxyMode,
    ServerLaunch,
    REGISTRY,
};
use tokio::runtime::Builder;

use super::lifecycle::{Lifecycle, Phase};
use crate::{
    error::{DispatcherError, DispatcherResult},
    logging::{self, LogConfig},
    monitor::TermMonitor,
    statedir,
    vparser,
};

/// Defines command line options
pub fn define_command_line_options(mut app: Command) -> Command {
    app = app
        .arg(
            Arg::new("PT_VERSION")
                .long("ptversion")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify the Pluggable Transport protocol version to use"),
        )
        .arg(
            Arg::new("STATE")
                .long("state")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify the transport plugin's state directory"),
        )
        .arg(
            Arg::new("EXIT_ON_STDIN_CLOSE")
                .long("exit-on-stdin-close")
                .action(ArgAction::SetTrue)
                .help("Set to shutdown the proxy when stdin is closed"),
        )
        .arg(
            Arg::new("TRANSPORTS")
                .long("transports")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify transports to enable, comma separated, * for all of them"),
        )
        .arg(
            Arg::new("PROXY")
                .long("proxy")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify an HTTP or SOCKS4a proxy that the PT needs to use to reach the Internet"),
        )
        .arg(
            Arg::new("OPTIONS")
                .long("options")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify the transport options for the server, transport:key=value[,key=value][;...]"),
        )
        .arg(
            Arg::new("BIND_ADDR")
                .long("bindaddr")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify the bind address for transparent server, transport-host:port[,...]"),
        )
        .arg(
            Arg::new("OR_PORT")
                .long("orport")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify the address the server should forward traffic to in host:port format"),
        )
        .arg(
            Arg::new("EXT_OR_PORT")
                .long("extorport")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify the address of a server implementing the Extended OR Port protocol"),
        )
        .arg(
            Arg::new("AUTH_COOKIE")
                .long("authcookie")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify an authentication cookie, for use in authenticating with the Extended OR Port"),
        )
        .arg(
            Arg::new("PROXY_LISTEN_ADDR")
                .long("proxylistenaddr")
                .num_args(1)
                .action(ArgAction::Set)
                .default_value("127.0.0.1:0")
                .value_parser(vparser::parse_socket_addr)
                .help("Specify the bind address for the local SOCKS server provided by the client"),
        )
        .arg(
            Arg::new("VERSION")
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print version and exit"),
        )
        .arg(
            Arg::new("LOG_LEVEL")
                .long("logLevel")
                .num_args(1)
                .action(ArgAction::Set)
                .default_value("ERROR")
                .value_parser(vparser::parse_log_level)
                .help("Log level (ERROR/WARN/INFO/DEBUG)"),
        )
        .arg(
            Arg::new("ENABLE_LOGGING")
                .long("enableLogging")
                .action(ArgAction::SetTrue)
                .help("Log to TOR_PT_STATE_LOCATION/dispatcher.log"),
        )
        .arg(
            Arg::new("UNSAFE_LOGGING")
                .long("unsafeLogging")
                .action(ArgAction::SetTrue)
                .help("Disable the address scrubber"),
        )
        .arg(
            Arg::new("CLIENT")
                .long("client")
                .action(ArgAction::SetTrue)
                .conflicts_with("SERVER")
                .help("Enable client mode"),
        )
        .arg(
            Arg::new("SERVER")
                .long("server")
                .action(ArgAction::SetTrue)
                .help("Enable server mode"),
        )
        .arg(
            Arg::new("TRANSPARENT")
                .long("transparent")
                .action(ArgAction::SetTrue)
                .help("Enable transparent proxy mode. The default is protocol-aware proxy mode (socks5 for TCP, STUN for UDP)"),
        )
        .arg(
            Arg::new("UDP")
                .long("udp")
                .action(ArgAction::SetTrue)
                .help("Enable UDP proxy mode. The default is TCP proxy mode."),
        )
        .arg(
            Arg::new("TARGET")
                .long("target")
                .num_args(1)
                .action(ArgAction::Set)
                .help("Specify transport server destination address"),
        );

    app
}

/// Program entrance `main`
pub fn main(matches: &ArgMatches) -> ExitCode {
    if matches.get_flag("VERSION") {
        println!("dispatcher-{}", crate::VERSION);
        return ExitCode::SUCCESS;
    }

    match run(matches, &ProcessEnvironment) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("{err}");
            if err.wants_usage() {
                let mut app = define_command_line_options(Command::new("shapeshifter-dispatcher"));
                eprintln!("{}", app.render_usage());
            }
            err.exit_code().into()
        }
    }
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> Option<&'a str> {
    matches.get_one::<String>(id).map(String::as_str)
}

fn exit_on_stdin_close(matches: &ArgMatches, env: &dyn Environment) -> bool {
    matches.get_flag("EXIT_ON_STDIN_CLOSE") || env.var(EXIT_ON_STDIN_CLOSE).as_deref() == Some("1")
}

/// Role and configuration, everything a launcher needs
#[derive(Debug)]
enum Resolved {
    Client(ClientLaunch),
    Server(ServerLaunch),
}

/// Decides the role, then resolves that role's configuration
///
/// Nothing role specific is looked at before the role is known.
fn resolve<W: std::io::Write>(
    matches: &ArgMatches,
    env: &dyn Environment,
    messenger: &mut Messenger<W>,
) -> DispatcherResult<Resolved> {
    let role = Role::decide(matches.get_flag("CLIENT"), matches.get_flag("SERVER"), env)?;
    info!("running as {}", role);

    match role {
        Role::Client => {
            let settings = ClientSettings {
                ptversion: string_arg(matches, "PT_VERSION").map(ToOwned::to_owned),
                transports: string_arg(matches, "TRANSPORTS").map(ToOwned::to_owned),
                proxy: string_arg(matches, "PROXY").map(ToOwned::to_owned),
            };
            let config = ClientConfig::resolve(&settings, env, REGISTRY, messenger)?;
            let listen_addr = matches
                .get_one::<SocketAddr>("PROXY_LISTEN_ADDR")
                .copied()
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)));

            Ok(Resolved::Client(ClientLaunch {
                listen_addr,
                target: string_arg(matches, "TARGET").map(ToOwned::to_owned),
                config,
            }))
        }
        Role::Server => {
            let settings = ServerSettings {
                options: string_arg(matches, "OPTIONS").map(ToOwned::to_owned),
                bindaddr: string_arg(matches, "BIND_ADDR").map(ToOwned::to_owned),
                transports: string_arg(matches, "TRANSPORTS").map(ToOwned::to_owned),
                orport: string_arg(matches, "OR_PORT").map(ToOwned::to_owned),
                extorport: string_arg(matches, "EXT_OR_PORT").map(ToOwned::to_owned),
                authcookie: string_arg(matches, "AUTH_COOKIE").map(ToOwned::to_owned),
            };
            let config = ServerConfig::resolve(&settings, env)?;

            Ok(Resolved::Server(ServerLaunch { config }))
        }
    }
}

fn run(matches: &ArgMatches, env: &dyn Environment) -> DispatcherResult<()> {
    let mut lifecycle = Lifecycle::new();

    let state_dir = statedir::create(statedir::locate(string_arg(matches, "STATE"), env)?)?;

    let level = matches
        .get_one::<LevelFilter>("LOG_LEVEL")
        .copied()
        .unwrap_or(LevelFilter::Error);
    logging::init_with_config(&LogConfig::new(level, matches.get_flag("ENABLE_LOGGING"), &state_dir))?;
    scrub::set_safe_logging(!matches.get_flag("UNSAFE_LOGGING"));

    info!("dispatcher-{} starting", crate::VERSION);

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DispatcherError::RuntimeFailure)?;

    let tracker = ConnectionTracker::new();
    let mut monitor = {
        let _guard = runtime.enter();
        TermMonitor::new(&tracker, exit_on_stdin_close(matches, env)).map_err(DispatcherError::RuntimeFailure)?
    };

    lifecycle.enter(Phase::Resolving);
    let mut messenger = Messenger::stdout();
    let resolved = resolve(matches, env, &mut messenger)?;

    lifecycle.enter(Phase::Dispatching);
    let mode = ProxyMode::select(matches.get_flag("TRANSPARENT"), matches.get_flag("UDP"));
    debug!("proxy mode {:?}", mode);

    let result = runtime.block_on(async {
        let mut launched = match resolved {
            Resolved::Client(ref launch) => launch_client(mode, launch, &tracker, &mut messenger).await,
            Resolved::Server(ref launch) => launch_server(mode, launch, &tracker, &mut messenger).await,
        };
        if !launched.launched {
            return Err(DispatcherError::LaunchFailure);
        }

        lifecycle.supervise(&mut monitor, &mut launched.listeners).await;
        Ok(())
    });

    drop(monitor);
    // stdin may still be blocked in a reader thread
    runtime.shutdown_background();

    result
}

#[cfg(test)]
mod test {
    use shapeshifter_ipc::{Error as ConfigError, MapEnvironment};

    use super::*;

    fn command() -> Command {
        define_command_line_options(Command::new("shapeshifter-dispatcher"))
    }

    #[test]
    fn verify_command() {
        command().debug_assert();
    }

    #[test]
    fn client_and_server_conflict() {
        let err = command()
            .try_get_matches_from(["shapeshifter-dispatcher", "--client", "--server"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn defaults() {
        let matches = command().try_get_matches_from(["shapeshifter-dispatcher"]).unwrap();
        assert_eq!(
            matches.get_one::<SocketAddr>("PROXY_LISTEN_ADDR"),
            Some(&"127.0.0.1:0".parse().unwrap())
        );
        assert_eq!(matches.get_one::<LevelFilter>("LOG_LEVEL"), Some(&LevelFilter::Error));
        assert!(!exit_on_stdin_close(&matches, &MapEnvironment::new()));
        assert!(exit_on_stdin_close(
            &matches,
            &MapEnvironment::new().with(EXIT_ON_STDIN_CLOSE, "1")
        ));
    }

    #[test]
    fn role_before_configuration() {
        let matches = command()
            .try_get_matches_from(["shapeshifter-dispatcher", "--options", "obfs4:key"])
            .unwrap();
        let mut messenger = Messenger::new(Vec::new());

        let err = resolve(&matches, &MapEnvironment::new(), &mut messenger).unwrap_err();
        assert!(matches!(err, DispatcherError::AmbiguousRole(..)));
        assert!(messenger.into_inner().is_empty());
    }

    #[test]
    fn server_from_flags() {
        let matches = command()
            .try_get_matches_from([
                "shapeshifter-dispatcher",
                "--server",
                "--transports",
                "identity",
                "--bindaddr",
                "identity-127.0.0.1:4000",
                "--orport",
                "127.0.0.1:9001",
                "--options",
                "identity:seed=1",
            ])
            .unwrap();
        let mut messenger = Messenger::new(Vec::new());

        match resolve(&matches, &MapEnvironment::new(), &mut messenger).unwrap() {
            Resolved::Server(launch) => {
                assert_eq!(launch.config.bindaddrs.len(), 1);
                assert_eq!(launch.config.bindaddrs[0].options.get("seed"), Some("1"));
                assert_eq!(launch.config.or_addr, "127.0.0.1:9001".parse().unwrap());
            }
            Resolved::Client(..) => panic!("resolved as client"),
        }
    }

    #[test]
    fn malformed_options_stop_server() {
        let matches = command()
            .try_get_matches_from([
                "shapeshifter-dispatcher",
                "--server",
                "--transports",
                "obfs4",
                "--bindaddr",
                "obfs4-127.0.0.1:4000",
                "--orport",
                "127.0.0.1:9001",
                "--options",
                "obfs4:key",
            ])
            .unwrap();
        let mut messenger = Messenger::new(Vec::new());

        let err = resolve(&matches, &MapEnvironment::new(), &mut messenger).unwrap_err();
        match err {
            DispatcherError::ResolveFailure(ConfigError::OptionParse { entry, .. }) => assert_eq!(entry, "obfs4:key"),
            err => panic!("unexpected {err}"),
        }
    }

    #[test]
    fn client_from_environment() {
        let matches = command()
            .try_get_matches_from(["shapeshifter-dispatcher", "--transparent", "--target", "127.0.0.1:9"])
            .unwrap();
        let env = MapEnvironment::new()
            .with("TOR_PT_MANAGED_TRANSPORT_VER", "1")
            .with("TOR_PT_CLIENT_TRANSPORTS", "*");
        let mut messenger = Messenger::new(Vec::new());

        match resolve(&matches, &env, &mut messenger).unwrap() {
            Resolved::Client(launch) => {
                assert_eq!(launch.config.method_names, REGISTRY);
                assert_eq!(launch.target.as_deref(), Some("127.0.0.1:9"));
            }
            Resolved::Server(..) => panic!("resolved as server"),
        }
        assert_eq!(messenger.into_inner(), b"VERSION 1\n");
    }
}
