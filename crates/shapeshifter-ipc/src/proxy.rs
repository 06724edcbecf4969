use std::io::Write;

use log::debug;
use url::Url;

use crate::{
    env::{Environment, PROXY},
    error::{Error, Result},
    ipc::Messenger,
    setting::lookup,
};

/// Parses an upstream proxy URL
///
/// Accepted forms are `http://[user:pass@]host:port` and `socks4a://[user@]host:port`.
/// The port must be written out, and paths, queries and fragments are rejected.
pub fn parse_proxy_url(s: &str) -> Result<Url> {
    let fail = |reason: &str| Error::ProxyUrl {
        url: s.to_owned(),
        reason: reason.to_owned(),
    };

    let url = Url::parse(s).map_err(|err| fail(&err.to_string()))?;

    match url.scheme() {
        "http" => {}
        "socks4a" => {
            if url.password().is_some() {
                return Err(fail("socks4a proxies do not take a password"));
            }
        }
        _ => return Err(fail("scheme must be http or socks4a")),
    }

    match url.host_str() {
        Some(h) if !h.is_empty() => {}
        _ => return Err(fail("missing host")),
    }
    if !has_explicit_port(s) {
        return Err(fail("missing port"));
    }
    if !matches!(url.path(), "" | "/") {
        return Err(fail("path is not allowed"));
    }
    if url.query().is_some() {
        return Err(fail("query is not allowed"));
    }
    if url.fragment().is_some() {
        return Err(fail("fragment is not allowed"));
    }

    Ok(url)
}

// `Url` hides a port equal to the scheme default, so look at the authority text instead
fn has_explicit_port(s: &str) -> bool {
    let rest = match s.split_once("://") {
        Some((_, rest)) => rest,
        None => return false,
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);

    let port = match host_port.rfind(']') {
        Some(i) => host_port[i + 1..].strip_prefix(':'),
        None => host_port.rsplit_once(':').map(|(_, p)| p),
    };
    matches!(port, Some(p) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Resolves the upstream proxy from `--proxy` or `TOR_PT_PROXY`
///
/// Reports the outcome to the parent: `PROXY DONE` when a proxy was accepted, `PROXY-ERROR`
/// when it was not. No proxy configured is not an error and sends nothing.
pub fn resolve_proxy<W: Write>(
    flag: Option<&str>,
    env: &dyn Environment,
    messenger: &mut Messenger<W>,
) -> Result<Option<Url>> {
    let setting = match lookup(flag, env, PROXY) {
        Some(s) => s,
        None => return Ok(None),
    };

    match parse_proxy_url(&setting.value) {
        Ok(url) => {
            debug!("using upstream proxy {}://{}", url.scheme(), url.host_str().unwrap_or_default());
            messenger.proxy_done();
            Ok(Some(url))
        }
        Err(err) => {
            messenger.proxy_error(&err.to_string());
            Err(err)
        }
    }
}
