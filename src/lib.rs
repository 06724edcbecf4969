//! shapeshifter-dispatcher runs pluggable transports as a managed proxy.
//!
//! A parent process (usually a Tor client or bridge) starts the dispatcher and tells it
//! what to run through command line flags or `TOR_PT_*` environment variables. The
//! dispatcher decides whether it is a client or a server, resolves the configuration,
//! starts one listener per transport and reports them back on standard output:
//!
//! ```plain
//! VERSION 2
//! CMETHOD identity socks5 127.0.0.1:41507
//! CMETHODS DONE
//! ```
//!
//! Run a client that offers a SOCKS5 listener for every built-in transport:
//!
//! ```bash
//! shapeshifter-dispatcher --client --state state --ptversion 2 --transports '*'
//! ```
//!
//! And a server forwarding to a local OR port:
//!
//! ```bash
//! shapeshifter-dispatcher --server --state state --transports identity \
//!     --bindaddr identity-127.0.0.1:2222 --orport 127.0.0.1:9001
//! ```
//!
//! `--transparent` and `--udp` pick one of the other proxy modes. The first SIGINT stops
//! the listeners and waits for open connections, a second one (or SIGTERM) exits.

pub mod error;
pub mod logging;
pub mod monitor;
pub mod service;
pub mod statedir;
pub mod vparser;

/// Build version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
