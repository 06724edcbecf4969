//! Transparent TCP mode: every client connection goes to `--target`, no negotiation

use std::{io, net::SocketAddr};

use tokio::net::TcpListener;

use crate::{
    launcher::ClientContext,
    listener::Listener,
    relay::{establish_tcp_tunnel, serve_forward, spawn_accept_loop},
    tracker::ConnectionTracker,
    transports::Transport,
};

pub(crate) async fn client_setup(
    transport: Transport,
    listen_addr: SocketAddr,
    context: &ClientContext,
) -> io::Result<Listener> {
    let target = context.target()?.clone();
    let listener = TcpListener::bind(listen_addr).await?;
    let dialer = context.dialer.clone();

    spawn_accept_loop(
        transport.name(),
        listener,
        context.tracker.clone(),
        move |mut stream, peer_addr| {
            let dialer = dialer.clone();
            let target = target.clone();
            async move {
                let mut remote = dialer.connect(&target).await?;
                establish_tcp_tunnel(&mut stream, &mut remote, peer_addr, &target).await
            }
        },
    )
}

pub(crate) async fn server_setup(
    transport: Transport,
    bind_addr: SocketAddr,
    or_addr: SocketAddr,
    tracker: &ConnectionTracker,
) -> io::Result<Listener> {
    serve_forward(transport.name(), bind_addr, or_addr, tracker.clone()).await
}
