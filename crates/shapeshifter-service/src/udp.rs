//! UDP datagram relay with per-peer associations
//!
//! Every local peer gets its own outbound socket, so replies can be routed back to the
//! peer they belong to. Associations idle for longer than the expiry are dropped.
//!
//! Closing the listener only stops receiving from local peers. Live associations keep
//! relaying replies until they go idle.

use std::{
    io::{self, ErrorKind},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use log::{debug, error, trace};
use lru_time_cache::LruCache;
use tokio::{net::UdpSocket, sync::mpsc, time};

use crate::{
    listener::Listener,
    scrub::elide,
    tracker::{ConnectionGuard, ConnectionTracker},
};

/// Largest datagram we relay
pub const MAXIMUM_UDP_PAYLOAD_SIZE: usize = 65536;

const UDP_ASSOCIATION_SEND_CHANNEL_SIZE: usize = 1024;
const UDP_ASSOCIATION_KEEP_ALIVE_CHANNEL_SIZE: usize = 64;

const STUN_HEADER_LEN: usize = 20;
const STUN_MAGIC_COOKIE: [u8; 4] = 0x2112_A442u32.to_be_bytes();

/// Which datagrams from local peers are relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketFilter {
    Any,
    /// Only STUN messages (RFC 5389)
    Stun,
}

impl PacketFilter {
    pub fn accepts(self, data: &[u8]) -> bool {
        match self {
            PacketFilter::Any => true,
            PacketFilter::Stun => is_stun_message(data),
        }
    }
}

/// Checks the fixed STUN header
///
/// ```plain
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |0 0|     STUN Message Type     |         Message Length        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Magic Cookie                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                     Transaction ID (96 bits)                  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
pub fn is_stun_message(data: &[u8]) -> bool {
    if data.len() < STUN_HEADER_LEN || data[0] & 0xc0 != 0 || data[4..8] != STUN_MAGIC_COOKIE {
        return false;
    }

    let length = u16::from_be_bytes([data[2], data[3]]) as usize;
    length % 4 == 0 && STUN_HEADER_LEN + length == data.len()
}

/// Binds `listen_addr` and relays datagrams between local peers and `forward_addr`
pub(crate) async fn serve_udp(
    method_name: &str,
    listen_addr: SocketAddr,
    forward_addr: SocketAddr,
    filter: PacketFilter,
    tracker: ConnectionTracker,
) -> io::Result<Listener> {
    serve_udp_with_expiry(
        method_name,
        listen_addr,
        forward_addr,
        filter,
        tracker,
        crate::DEFAULT_UDP_EXPIRY_DURATION,
    )
    .await
}

async fn serve_udp_with_expiry(
    method_name: &str,
    listen_addr: SocketAddr,
    forward_addr: SocketAddr,
    filter: PacketFilter,
    tracker: ConnectionTracker,
    expiry: Duration,
) -> io::Result<Listener> {
    let socket = UdpSocket::bind(listen_addr).await?;
    let local_addr = socket.local_addr()?;

    let relay = UdpRelay {
        method_name: method_name.to_owned(),
        inbound: Arc::new(socket),
        forward_addr,
        filter,
        tracker,
        expiry,
    };
    let handle = tokio::spawn(relay.run());

    Ok(Listener::new(method_name, local_addr, handle))
}

struct UdpRelay {
    method_name: String,
    inbound: Arc<UdpSocket>,
    forward_addr: SocketAddr,
    filter: PacketFilter,
    tracker: ConnectionTracker,
    expiry: Duration,
}

impl UdpRelay {
    async fn run(self) {
        let (keepalive_tx, mut keepalive_rx) = mpsc::channel(UDP_ASSOCIATION_KEEP_ALIVE_CHANNEL_SIZE);
        let mut assoc_map: LruCache<SocketAddr, UdpAssociation> = LruCache::with_expiry_duration(self.expiry);
        let mut cleanup_timer = time::interval(self.expiry);

        let mut buffer = vec![0u8; MAXIMUM_UDP_PAYLOAD_SIZE];
        loop {
            tokio::select! {
                _ = cleanup_timer.tick() => {
                    // iterating evicts expired associations
                    assoc_map.iter();
                }

                Some(peer_addr) = keepalive_rx.recv() => {
                    assoc_map.get(&peer_addr);
                }

                recv_result = self.inbound.recv_from(&mut buffer) => {
                    let (n, peer_addr) = match recv_result {
                        Ok(s) => s,
                        Err(err) => {
                            error!("{} udp recv_from failed with error: {}", self.method_name, err);
                            time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let data = &buffer[..n];
                    if !self.filter.accepts(data) {
                        trace!("{} dropped {} bytes from {}, rejected by {:?} filter", self.method_name, n, elide(&peer_addr), self.filter);
                        continue;
                    }

                    if let Some(assoc) = assoc_map.get(&peer_addr) {
                        if let Err(err) = assoc.try_send(Bytes::copy_from_slice(data)) {
                            debug!("udp relay {} -> {} dropped {} bytes: {}", elide(&peer_addr), elide(&self.forward_addr), n, err);
                        }
                        continue;
                    }

                    let assoc = UdpAssociation::new(
                        self.inbound.clone(),
                        peer_addr,
                        self.forward_addr,
                        keepalive_tx.clone(),
                        self.tracker.guard(),
                        self.expiry,
                    );
                    debug!("created udp association for {} <-> {}", elide(&peer_addr), elide(&self.forward_addr));

                    if let Err(err) = assoc.try_send(Bytes::copy_from_slice(data)) {
                        debug!("udp relay {} -> {} dropped {} bytes: {}", elide(&peer_addr), elide(&self.forward_addr), n, err);
                    }
                    assoc_map.insert(peer_addr, assoc);
                }
            }
        }
    }
}

/// Sending half of an association
///
/// Dropping it only stops the peer to upstream direction, the association task ends by
/// itself once idle.
struct UdpAssociation {
    sender: mpsc::Sender<Bytes>,
}

impl UdpAssociation {
    fn new(
        inbound: Arc<UdpSocket>,
        peer_addr: SocketAddr,
        forward_addr: SocketAddr,
        keepalive_tx: mpsc::Sender<SocketAddr>,
        guard: ConnectionGuard,
        expiry: Duration,
    ) -> UdpAssociation {
        let (sender, receiver) = mpsc::channel(UDP_ASSOCIATION_SEND_CHANNEL_SIZE);

        let context = UdpAssociationContext {
            inbound,
            peer_addr,
            forward_addr,
            keepalive_tx,
            expiry,
            _guard: guard,
        };
        tokio::spawn(async move {
            if let Err(err) = context.copy_bidirectional(receiver).await {
                error!(
                    "udp association {} <-> {} failed: {}",
                    elide(&context.peer_addr),
                    elide(&context.forward_addr),
                    err
                );
            }
        });

        UdpAssociation { sender }
    }

    fn try_send(&self, data: Bytes) -> io::Result<()> {
        if self.sender.try_send(data).is_err() {
            return Err(io::Error::new(ErrorKind::Other, "udp relay channel full"));
        }
        Ok(())
    }
}

struct UdpAssociationContext {
    inbound: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    forward_addr: SocketAddr,
    keepalive_tx: mpsc::Sender<SocketAddr>,
    expiry: Duration,
    _guard: ConnectionGuard,
}

impl Drop for UdpAssociationContext {
    fn drop(&mut self) {
        trace!("udp association for {} is closed", elide(&self.peer_addr));
    }
}

impl UdpAssociationContext {
    async fn copy_bidirectional(&self, mut receiver: mpsc::Receiver<Bytes>) -> io::Result<()> {
        let bind_addr = match self.forward_addr {
            SocketAddr::V4(..) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            SocketAddr::V6(..) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
        };
        let outbound = UdpSocket::bind(bind_addr).await?;
        outbound.connect(self.forward_addr).await?;

        let idle = time::sleep(self.expiry);
        tokio::pin!(idle);

        let mut peer_open = true;
        let mut buffer = vec![0u8; MAXIMUM_UDP_PAYLOAD_SIZE];
        loop {
            tokio::select! {
                _ = &mut idle => {
                    trace!("udp association for {} idle for {:?}", elide(&self.peer_addr), self.expiry);
                    return Ok(());
                }

                data = receiver.recv(), if peer_open => {
                    let data = match data {
                        Some(d) => d,
                        None => {
                            trace!("udp association for {} relays replies only", elide(&self.peer_addr));
                            peer_open = false;
                            continue;
                        }
                    };
                    idle.as_mut().reset(time::Instant::now() + self.expiry);

                    if let Err(err) = outbound.send(&data).await {
                        error!("udp failed to send to {}, error: {}", elide(&self.forward_addr), err);
                    } else {
                        trace!("udp relay {} -> {} with {} bytes", elide(&self.peer_addr), elide(&self.forward_addr), data.len());
                    }
                }

                recv_result = outbound.recv(&mut buffer) => {
                    let n = match recv_result {
                        Ok(n) => n,
                        Err(err) => {
                            // ICMP port unreachable surfaces here on some platforms
                            debug!("udp failed to receive from {}, error: {}", elide(&self.forward_addr), err);
                            continue;
                        }
                    };

                    if let Err(err) = self.inbound.send_to(&buffer[..n], self.peer_addr).await {
                        error!("udp failed to send back to {}, error: {}", elide(&self.peer_addr), err);
                        continue;
                    }
                    trace!("udp relay {} <- {} with {} bytes", elide(&self.peer_addr), elide(&self.forward_addr), n);
                    idle.as_mut().reset(time::Instant::now() + self.expiry);

                    let _ = self.keepalive_tx.try_send(self.peer_addr);
                }
            }
        }
    }
}
