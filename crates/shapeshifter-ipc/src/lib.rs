//! Pluggable Transport configuration protocol
//!
//! A managed pluggable transport learns how it should run from two places: command line
//! flags and the `TOR_PT_*` environment variables set by its parent process. This crate
//! merges both sources into a validated [`ServerConfig`] or [`ClientConfig`], decides the
//! process [`Role`], and writes the line-oriented status messages the parent reads from
//! standard output.
//!
//! ```plain
//! +--------------+    flags     +----------------+   ServerConfig   +-----------+
//! | command line +------------->+                +----------------->+  server   |
//! +--------------+              |  resolvers     |                  | launchers |
//! +--------------+   TOR_PT_*   |  (this crate)  |   ClientConfig   +-----------+
//! | environment  +------------->+                +----------------->+  client   |
//! +--------------+              +-------+--------+                  | launchers |
//!                                       | VERSION / PROXY DONE ...  +-----------+
//!                                       v
//!                                    stdout
//! ```
//!
//! Resolution is synchronous and all-or-nothing: the first failure is returned and no
//! partial configuration escapes.

pub use self::{
    addr::resolve_addr,
    args::{parse_client_args, parse_transport_options, Args, OptionsFormat, TransportOptions},
    bindaddr::{filter_bindaddrs, parse_bindaddrs, Bindaddr},
    client::{ClientConfig, ClientSettings},
    env::{Environment, MapEnvironment, ProcessEnvironment},
    error::{Error, Result},
    ipc::Messenger,
    proxy::{parse_proxy_url, resolve_proxy},
    role::Role,
    server::{ServerConfig, ServerSettings},
    setting::{Origin, Source, Sourced},
};

mod addr;
pub mod args;
mod bindaddr;
mod client;
pub mod env;
mod error;
pub mod ipc;
mod proxy;
mod role;
mod server;
pub mod setting;

/// PT protocol versions this implementation speaks, in preference order
pub const SUPPORTED_VERSIONS: &[&str] = &["2", "1"];
