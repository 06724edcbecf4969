//! Environment accessor
//!
//! Resolvers never call `std::env` directly; they read through [`Environment`] so that
//! each one can be exercised against a [`MapEnvironment`] in tests.

use std::collections::HashMap;

use crate::error::{Error, Result};

pub const MANAGED_TRANSPORT_VER: &str = "TOR_PT_MANAGED_TRANSPORT_VER";
pub const STATE_LOCATION: &str = "TOR_PT_STATE_LOCATION";
pub const EXIT_ON_STDIN_CLOSE: &str = "TOR_PT_EXIT_ON_STDIN_CLOSE";
pub const CLIENT_TRANSPORTS: &str = "TOR_PT_CLIENT_TRANSPORTS";
pub const PROXY: &str = "TOR_PT_PROXY";
pub const SERVER_BINDADDR: &str = "TOR_PT_SERVER_BINDADDR";
pub const SERVER_TRANSPORTS: &str = "TOR_PT_SERVER_TRANSPORTS";
pub const SERVER_TRANSPORT_OPTIONS: &str = "TOR_PT_SERVER_TRANSPORT_OPTIONS";
pub const ORPORT: &str = "TOR_PT_ORPORT";
pub const EXTENDED_SERVER_PORT: &str = "TOR_PT_EXTENDED_SERVER_PORT";
pub const AUTH_COOKIE_FILE: &str = "TOR_PT_AUTH_COOKIE_FILE";

/// Read-only view of the variables a pluggable transport is launched with
pub trait Environment {
    /// Raw value of `name`, `None` if it is not set
    fn var(&self, name: &str) -> Option<String>;

    /// Value of `name`, failing with `MissingEnvironment` when it is absent
    fn required(&self, name: &'static str) -> Result<String> {
        self.var(name).ok_or(Error::MissingEnvironment(name))
    }

    /// Value of `name`, `""` when it is absent
    fn optional(&self, name: &str) -> String {
        self.var(name).unwrap_or_default()
    }
}

/// The environment of the running process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// An environment backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    /// Creates an empty environment
    pub fn new() -> MapEnvironment {
        MapEnvironment::default()
    }

    /// Sets `name` to `value`
    pub fn set<K, V>(&mut self, name: K, value: V) -> &mut MapEnvironment
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Builder-style [`MapEnvironment::set`]
    pub fn with<K, V>(mut self, name: K, value: V) -> MapEnvironment
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set(name, value);
        self
    }
}

impl Environment for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnvironment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> MapEnvironment {
        MapEnvironment {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
