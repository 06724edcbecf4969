//! Transparent UDP mode: datagrams from every local peer are relayed to `--target`

use std::{io, net::SocketAddr};

use crate::{
    launcher::{resolve_target, ClientContext},
    listener::Listener,
    tracker::ConnectionTracker,
    transports::Transport,
    udp::{serve_udp, PacketFilter},
};

pub(crate) async fn client_setup(
    transport: Transport,
    listen_addr: SocketAddr,
    context: &ClientContext,
) -> io::Result<Listener> {
    let target = resolve_target(context.target()?).await?;
    serve_udp(
        transport.name(),
        listen_addr,
        target,
        PacketFilter::Any,
        context.tracker.clone(),
    )
    .await
}

pub(crate) async fn server_setup(
    transport: Transport,
    bind_addr: SocketAddr,
    or_addr: SocketAddr,
    tracker: &ConnectionTracker,
) -> io::Result<Listener> {
    serve_udp(transport.name(), bind_addr, or_addr, PacketFilter::Any, tracker.clone()).await
}
