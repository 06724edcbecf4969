use std::io::Write;

use log::{debug, info};
use url::Url;

use crate::{
    env::{Environment, CLIENT_TRANSPORTS, MANAGED_TRANSPORT_VER},
    error::{Error, Result},
    ipc::Messenger,
    proxy::resolve_proxy,
    SUPPORTED_VERSIONS,
};

/// Client related command line values, `None` for flags that were not given
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub ptversion: Option<String>,
    pub transports: Option<String>,
    pub proxy: Option<String>,
}

/// Validated client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Transports to offer, in the order they should be tried
    pub method_names: Vec<String>,
    /// Upstream proxy every outgoing connection goes through
    pub proxy: Option<Url>,
}

impl ClientConfig {
    /// Merges flags and environment into a client configuration
    ///
    /// With both `--ptversion` and `--transports` the flags are used as given, `*` meaning
    /// every transport in `registry`. Otherwise the whole selection comes from the
    /// parent's environment, negotiating the PT version on `messenger`.
    pub fn resolve<W: Write>(
        settings: &ClientSettings,
        env: &dyn Environment,
        registry: &[&str],
        messenger: &mut Messenger<W>,
    ) -> Result<ClientConfig> {
        let method_names = match (supplied(&settings.ptversion), supplied(&settings.transports)) {
            (Some(_), Some(transports)) => expand_transports(transports, registry),
            (ptversion, transports) => {
                info!(
                    "falling back to environment for PT version and transports, --ptversion: {:?}, --transports: {:?}",
                    ptversion, transports
                );
                environment_setup(env, registry, messenger)?
            }
        };
        debug!("client transports: {:?}", method_names);

        let proxy = resolve_proxy(settings.proxy.as_deref(), env, messenger)?;

        Ok(ClientConfig { method_names, proxy })
    }
}

/// Empty flags count as not given
fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn expand_transports(list: &str, registry: &[&str]) -> Vec<String> {
    if list == "*" {
        registry.iter().map(|s| (*s).to_owned()).collect()
    } else {
        list.split(',').map(ToOwned::to_owned).collect()
    }
}

fn environment_setup<W: Write>(
    env: &dyn Environment,
    registry: &[&str],
    messenger: &mut Messenger<W>,
) -> Result<Vec<String>> {
    let offered = match env.required(MANAGED_TRANSPORT_VER) {
        Ok(v) => v,
        Err(err) => {
            messenger.env_error(&err.to_string());
            return Err(err);
        }
    };

    let version = match offered.split(',').find(|v| SUPPORTED_VERSIONS.contains(v)) {
        Some(v) => v,
        None => {
            messenger.version_error();
            return Err(Error::UnsupportedVersion(offered));
        }
    };
    messenger.version(version);

    match env.required(CLIENT_TRANSPORTS) {
        Ok(transports) => Ok(expand_transports(&transports, registry)),
        Err(err) => {
            messenger.env_error(&err.to_string());
            Err(err)
        }
    }
}
