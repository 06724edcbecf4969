//! Launch dispatch
//!
//! The lifecycle controller resolves a configuration, picks a [`ProxyMode`] and hands both
//! to [`launch_client`] or [`launch_server`]. Those start one listener per usable transport,
//! report each outcome to the parent on the [`Messenger`] and return a [`LaunchResult`].

use std::{
    io::{self, ErrorKind, Write},
    net::SocketAddr,
    sync::Arc,
};

use log::{error, info, warn};
use shapeshifter_ipc::{ClientConfig, Messenger, ServerConfig};
use tokio::net::lookup_host;

use crate::{
    listener::Listener,
    mode::{pt_socks5, stun_udp, transparent_tcp, transparent_udp, ProxyMode},
    proxy_dialer::ProxyDialer,
    scrub::elide,
    socks5::Address,
    tracker::ConnectionTracker,
    transports::Transport,
};

/// Everything a client launcher needs
#[derive(Debug, Clone)]
pub struct ClientLaunch {
    /// `--proxylistenaddr`
    pub listen_addr: SocketAddr,
    /// `--target`, where transparent and STUN clients send their traffic
    pub target: Option<String>,
    pub config: ClientConfig,
}

/// Everything a server launcher needs
#[derive(Debug, Clone)]
pub struct ServerLaunch {
    pub config: ServerConfig,
}

/// What a launcher started
#[derive(Debug, Default)]
pub struct LaunchResult {
    /// At least one listener is running
    pub launched: bool,
    pub listeners: Vec<Listener>,
}

impl LaunchResult {
    fn new(listeners: Vec<Listener>) -> LaunchResult {
        LaunchResult {
            launched: !listeners.is_empty(),
            listeners,
        }
    }
}

/// Shared state of the client listeners
#[derive(Debug, Clone)]
pub(crate) struct ClientContext {
    pub tracker: ConnectionTracker,
    pub dialer: Arc<ProxyDialer>,
    pub target: Option<Address>,
}

impl ClientContext {
    pub fn target(&self) -> io::Result<&Address> {
        self.target
            .as_ref()
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "--target is required in this mode"))
    }
}

/// Parses `host:port` without resolving it, so names can be handed to the upstream proxy
pub fn parse_target(s: &str) -> io::Result<Address> {
    if let Ok(sa) = s.parse::<SocketAddr>() {
        return Ok(Address::SocketAddress(sa));
    }

    let invalid = || io::Error::new(ErrorKind::InvalidInput, format!("invalid target {:?}", s));
    match s.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.contains(':') => match port.parse::<u16>() {
            Ok(port) => Ok(Address::DomainNameAddress(host.to_owned(), port)),
            Err(..) => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

/// Resolves an address for datagram relaying, which cannot defer name resolution
pub(crate) async fn resolve_target(addr: &Address) -> io::Result<SocketAddr> {
    match *addr {
        Address::SocketAddress(sa) => Ok(sa),
        Address::DomainNameAddress(ref name, port) => lookup_host((name.as_str(), port))
            .await?
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, format!("{} resolved to no address", name))),
    }
}

/// Starts a client listener for every requested transport
pub async fn launch_client<W: Write>(
    mode: ProxyMode,
    launch: &ClientLaunch,
    tracker: &ConnectionTracker,
    messenger: &mut Messenger<W>,
) -> LaunchResult {
    info!("initializing {} client", mode);

    let dialer = match ProxyDialer::new(launch.config.proxy.as_ref()) {
        Ok(d) => d,
        Err(err) => {
            error!("upstream proxy unusable: {}", err);
            return LaunchResult::default();
        }
    };
    if mode.is_udp() && dialer != ProxyDialer::Direct {
        warn!("{} mode sends datagrams directly, the upstream proxy only carries TCP", mode);
    }

    let target = match launch.target.as_deref().filter(|t| !t.is_empty()) {
        Some(t) => match parse_target(t) {
            Ok(addr) => Some(addr),
            Err(err) => {
                error!("{}", err);
                None
            }
        },
        None => None,
    };
    if mode.requires_target() && target.is_none() {
        error!("{} client needs a valid --target", mode);
    }

    let context = ClientContext {
        tracker: tracker.clone(),
        dialer: Arc::new(dialer),
        target,
    };

    let mut listeners = Vec::new();
    for name in &launch.config.method_names {
        let transport = match Transport::lookup(name) {
            Some(t) => t,
            None => {
                messenger.cmethod_error(name, "no such transport is supported");
                continue;
            }
        };

        let result = match mode {
            ProxyMode::Socks5 => pt_socks5::client_setup(transport, launch.listen_addr, &context).await,
            ProxyMode::TransparentTcp => transparent_tcp::client_setup(transport, launch.listen_addr, &context).await,
            ProxyMode::TransparentUdp => transparent_udp::client_setup(transport, launch.listen_addr, &context).await,
            ProxyMode::StunUdp => stun_udp::client_setup(transport, launch.listen_addr, &context).await,
        };

        match result {
            Ok(listener) => {
                info!("{} client listening on {}", name, elide(&listener.local_addr()));
                messenger.cmethod(name, mode.protocol(), listener.local_addr());
                listeners.push(listener);
            }
            Err(err) => {
                error!("{} client failed to start: {}", name, err);
                messenger.cmethod_error(name, &err.to_string());
            }
        }
    }
    messenger.cmethods_done();

    LaunchResult::new(listeners)
}

/// Starts a server listener for every enabled bind address
pub async fn launch_server<W: Write>(
    mode: ProxyMode,
    launch: &ServerLaunch,
    tracker: &ConnectionTracker,
    messenger: &mut Messenger<W>,
) -> LaunchResult {
    info!("initializing {} server", mode);

    let config = &launch.config;
    if let Some(ext_or_addr) = config.ext_or_addr {
        warn!(
            "extended OR port {} is not used, traffic goes to the OR port {}",
            elide(&ext_or_addr),
            elide(&config.or_addr)
        );
    }

    let mut listeners = Vec::new();
    for bindaddr in &config.bindaddrs {
        let name = bindaddr.method_name.as_str();
        let transport = match Transport::lookup(name) {
            Some(t) => t,
            None => {
                messenger.smethod_error(name, "no such transport is supported");
                continue;
            }
        };

        let result = match mode {
            ProxyMode::Socks5 => pt_socks5::server_setup(transport, bindaddr.addr, config.or_addr, tracker).await,
            ProxyMode::TransparentTcp => {
                transparent_tcp::server_setup(transport, bindaddr.addr, config.or_addr, tracker).await
            }
            ProxyMode::TransparentUdp => {
                transparent_udp::server_setup(transport, bindaddr.addr, config.or_addr, tracker).await
            }
            ProxyMode::StunUdp => stun_udp::server_setup(transport, bindaddr.addr, config.or_addr, tracker).await,
        };

        match result {
            Ok(listener) => {
                info!("{} server listening on {}", name, elide(&listener.local_addr()));
                messenger.smethod(name, listener.local_addr(), &transport.server_args(&bindaddr.options));
                listeners.push(listener);
            }
            Err(err) => {
                error!("{} server failed to start: {}", name, err);
                messenger.smethod_error(name, &err.to_string());
            }
        }
    }
    messenger.smethods_done();

    LaunchResult::new(listeners)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn targets() {
        assert_eq!(
            parse_target("127.0.0.1:53").unwrap(),
            Address::SocketAddress("127.0.0.1:53".parse().unwrap())
        );
        assert_eq!(
            parse_target("stun.example:3478").unwrap(),
            Address::DomainNameAddress("stun.example".to_owned(), 3478)
        );
        assert!(parse_target("stun.example").is_err());
        assert!(parse_target("::1:53").is_err());
        assert!(parse_target(":53").is_err());
    }
}
