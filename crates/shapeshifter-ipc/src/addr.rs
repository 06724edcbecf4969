use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{Error, Result};

/// Resolves `host:port` into a socket address
///
/// `host` is an IPv4 literal, a bracketed IPv6 literal or a domain name. The port is
/// mandatory. Domain names go through the system resolver and the first answer is used.
pub fn resolve_addr(addr: &str) -> Result<SocketAddr> {
    if let Ok(sa) = addr.parse::<SocketAddr>() {
        return Ok(sa);
    }

    let fail = |reason: &str| Error::AddressResolution {
        addr: addr.to_owned(),
        reason: reason.to_owned(),
    };

    let (host, port) = match addr.rsplit_once(':') {
        Some(p) => p,
        None => return Err(fail("missing port")),
    };
    if host.is_empty() {
        return Err(fail("missing host"));
    }
    // Literal IPv6 addresses must be bracketed, and brackets around anything else are junk
    if host.contains(':') || host.starts_with('[') {
        return Err(fail("invalid host"));
    }
    let port = match port.parse::<u16>() {
        Ok(p) => p,
        Err(..) => return Err(fail("invalid port")),
    };

    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.next().ok_or_else(|| fail("no address found")),
        Err(err) => Err(fail(&err.to_string())),
    }
}
