use std::{net::SocketAddr, path::PathBuf};

use log::{debug, trace};

use crate::{
    addr::resolve_addr,
    args::{parse_transport_options, OptionsFormat},
    bindaddr::{filter_bindaddrs, parse_bindaddrs, Bindaddr},
    env::{
        Environment,
        AUTH_COOKIE_FILE,
        EXTENDED_SERVER_PORT,
        ORPORT,
        SERVER_BINDADDR,
        SERVER_TRANSPORTS,
        SERVER_TRANSPORT_OPTIONS,
    },
    error::Result,
    setting::{lookup, lookup_required},
};

/// Server related command line values, `None` for flags that were not given
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    pub options: Option<String>,
    pub bindaddr: Option<String>,
    pub transports: Option<String>,
    pub orport: Option<String>,
    pub extorport: Option<String>,
    pub authcookie: Option<String>,
}

/// Validated server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Enabled transports and where they listen, in input order
    pub bindaddrs: Vec<Bindaddr>,
    /// Upstream OR address
    pub or_addr: SocketAddr,
    /// Extended OR address
    pub ext_or_addr: Option<SocketAddr>,
    /// Extended OR authentication cookie
    pub auth_cookie_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Merges flags and environment into a server configuration
    ///
    /// Steps run in a fixed order and the first failure is returned:
    ///
    /// 1. transport options, in the versioned grammar when given by `--options` and in the
    ///    legacy grammar when read from `TOR_PT_SERVER_TRANSPORT_OPTIONS`
    /// 2. bind addresses (required)
    /// 3. transport filter (required), dropping bind addresses of disabled transports
    /// 4. OR address (required)
    /// 5. extended OR address, optional but must resolve when present
    /// 6. auth cookie path
    pub fn resolve(settings: &ServerSettings, env: &dyn Environment) -> Result<ServerConfig> {
        let options = match lookup(settings.options.as_deref(), env, SERVER_TRANSPORT_OPTIONS) {
            Some(s) => {
                let format = if s.is_command_line() {
                    OptionsFormat::Versioned
                } else {
                    OptionsFormat::Legacy
                };
                parse_transport_options(&s.value, format)?
            }
            None => Default::default(),
        };
        trace!("server transport options for {} transports", options.len());

        let bindaddr = lookup_required(settings.bindaddr.as_deref(), env, SERVER_BINDADDR)?;
        let bindaddrs = parse_bindaddrs(&bindaddr.value, &options)?;

        let transports = lookup_required(settings.transports.as_deref(), env, SERVER_TRANSPORTS)?;
        let method_names: Vec<&str> = transports.value.split(',').collect();
        let total = bindaddrs.len();
        let bindaddrs = filter_bindaddrs(bindaddrs, &method_names);
        if bindaddrs.len() != total {
            debug!(
                "{} of {} bind addresses dropped, transports not enabled",
                total - bindaddrs.len(),
                total
            );
        }

        let orport = lookup_required(settings.orport.as_deref(), env, ORPORT)?;
        let or_addr = resolve_addr(&orport.value)?;

        let ext_or_addr = match lookup(settings.extorport.as_deref(), env, EXTENDED_SERVER_PORT) {
            Some(s) => Some(resolve_addr(&s.value)?),
            None => None,
        };

        let auth_cookie_path = lookup(settings.authcookie.as_deref(), env, AUTH_COOKIE_FILE).map(|s| PathBuf::from(s.value));

        Ok(ServerConfig {
            bindaddrs,
            or_addr,
            ext_or_addr,
            auth_cookie_path,
        })
    }
}
