//! TCP accept loops and stream relaying

use std::{future::Future, io, net::SocketAddr, time::Duration};

use log::{debug, error, trace};
use tokio::{
    io::{copy_bidirectional, AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    time,
};

use crate::{listener::Listener, scrub::elide, socks5::Address, tracker::ConnectionTracker};

/// Runs `handler` for every connection accepted on `listener`, each in its own task
///
/// Every connection holds a guard from `tracker` until its handler returns.
pub(crate) fn spawn_accept_loop<F, Fut>(
    method_name: &str,
    listener: TcpListener,
    tracker: ConnectionTracker,
    handler: F,
) -> io::Result<Listener>
where
    F: Fn(TcpStream, SocketAddr) -> Fut + Send + 'static,
    Fut: Future<Output = io::Result<()>> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    let name = method_name.to_owned();

    let handle = tokio::spawn(async move {
        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(s) => s,
                Err(err) => {
                    error!("{} accept failed with error: {}", name, err);
                    time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            trace!("{} accepted connection from {}", name, elide(&peer_addr));

            let guard = tracker.guard();
            let task = handler(stream, peer_addr);
            let name = name.clone();
            tokio::spawn(async move {
                let _guard = guard;
                if let Err(err) = task.await {
                    debug!("{} connection from {} closed with error: {}", name, elide(&peer_addr), err);
                }
            });
        }
    });

    Ok(Listener::new(method_name, local_addr, handle))
}

/// Copies both directions until both sides are done
pub async fn establish_tcp_tunnel<L, R>(
    local: &mut L,
    remote: &mut R,
    peer_addr: SocketAddr,
    target_addr: &Address,
) -> io::Result<()>
where
    L: AsyncRead + AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    debug!("established tcp tunnel {} <-> {}", elide(&peer_addr), elide(target_addr));

    match copy_bidirectional(local, remote).await {
        Ok((l2r, r2l)) => {
            trace!(
                "tcp tunnel {} <-> {} closed, L2R {} bytes, R2L {} bytes",
                elide(&peer_addr),
                elide(target_addr),
                l2r,
                r2l
            );
        }
        Err(err) => {
            trace!(
                "tcp tunnel {} <-> {} closed with error: {}",
                elide(&peer_addr),
                elide(target_addr),
                err
            );
        }
    }

    Ok(())
}

/// Listens on `listen_addr` and forwards every connection to `forward_addr`
pub(crate) async fn serve_forward(
    method_name: &str,
    listen_addr: SocketAddr,
    forward_addr: SocketAddr,
    tracker: ConnectionTracker,
) -> io::Result<Listener> {
    let listener = TcpListener::bind(listen_addr).await?;

    spawn_accept_loop(method_name, listener, tracker, move |mut stream, peer_addr| async move {
        let mut remote = TcpStream::connect(forward_addr).await?;
        establish_tcp_tunnel(&mut stream, &mut remote, peer_addr, &forward_addr.into()).await
    })
}
