//! Pluggable transport mode launchers
//!
//! Given a resolved client or server configuration, starts one listener per usable
//! transport in one of four [`ProxyMode`]s and reports each to the parent process.
//! Live connections are counted by a [`ConnectionTracker`] so the process can wait for
//! them to drain before exiting.

use std::time::Duration;

pub use self::{
    launcher::{launch_client, launch_server, parse_target, ClientLaunch, LaunchResult, ServerLaunch},
    listener::Listener,
    mode::ProxyMode,
    proxy_dialer::ProxyDialer,
    tracker::{ConnectionGuard, ConnectionTracker},
    transports::{Transport, REGISTRY},
};
pub use shapeshifter_ipc;

mod launcher;
mod listener;
pub mod mode;
mod proxy_dialer;
mod relay;
pub mod scrub;
pub mod socks5;
mod tracker;
mod transports;
pub mod udp;

/// Idle time after which a UDP association is dropped
const DEFAULT_UDP_EXPIRY_DURATION: Duration = Duration::from_secs(5 * 60);
