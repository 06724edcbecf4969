//! PT 2.0 SOCKS5 mode
//!
//! The client is a SOCKS5 server: applications CONNECT to the bridge they want, passing
//! transport arguments through RFC 1929 username/password authentication. The server
//! accepts transport connections and forwards them to the OR port.

use std::{
    io::{self, ErrorKind},
    net::SocketAddr,
    str,
    sync::Arc,
};

use log::{debug, error, trace, warn};
use shapeshifter_ipc::{parse_client_args, Args};
use tokio::net::{TcpListener, TcpStream};

use crate::{
    launcher::ClientContext,
    listener::Listener,
    proxy_dialer::ProxyDialer,
    relay::{establish_tcp_tunnel, serve_forward, spawn_accept_loop},
    scrub::elide,
    socks5::{
        self,
        Address,
        Command,
        Error as Socks5Error,
        HandshakeRequest,
        HandshakeResponse,
        PasswdAuthRequest,
        PasswdAuthResponse,
        Reply,
        TcpRequestHeader,
        TcpResponseHeader,
    },
    tracker::ConnectionTracker,
    transports::Transport,
};

pub(crate) async fn client_setup(
    transport: Transport,
    listen_addr: SocketAddr,
    context: &ClientContext,
) -> io::Result<Listener> {
    let listener = TcpListener::bind(listen_addr).await?;

    let handler = Arc::new(Socks5TcpHandler {
        transport,
        dialer: context.dialer.clone(),
    });

    spawn_accept_loop(
        transport.name(),
        listener,
        context.tracker.clone(),
        move |stream, peer_addr| handler.clone().handle_socks5_client(stream, peer_addr),
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

struct Socks5TcpHandler {
    transport: Transport,
    dialer: Arc<ProxyDialer>,
}

impl Socks5TcpHandler {
    /// Negotiates the authentication method, returning the transport arguments sent by the client
    async fn check_auth(&self, stream: &mut TcpStream, handshake_req: &HandshakeRequest) -> io::Result<Args> {
        let methods = &handshake_req.methods;

        if methods.contains(&socks5::consts::SOCKS5_AUTH_METHOD_PASSWORD) {
            HandshakeResponse::new(socks5::consts::SOCKS5_AUTH_METHOD_PASSWORD)
                .write_to(stream)
                .await?;
            return self.check_auth_password(stream).await;
        }

        if methods.contains(&socks5::consts::SOCKS5_AUTH_METHOD_NONE) {
            HandshakeResponse::new(socks5::consts::SOCKS5_AUTH_METHOD_NONE)
                .write_to(stream)
                .await?;
            return Ok(Args::new());
        }

        HandshakeResponse::new(socks5::consts::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE)
            .write_to(stream)
            .await?;
        Err(io::Error::new(
            ErrorKind::PermissionDenied,
            format!("no acceptable authentication method in {:?}", methods),
        ))
    }

    async fn check_auth_password(&self, stream: &mut TcpStream) -> io::Result<Args> {
        let req = match PasswdAuthRequest::read_from(stream).await {
            Ok(r) => r,
            Err(err) => {
                let _ = PasswdAuthResponse::new(PasswdAuthResponse::FAILURE).write_to(stream).await;
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    format!("username/password authentication request failed: {}", err),
                ));
            }
        };

        let joined = req.joined();
        let parsed = match str::from_utf8(&joined) {
            Ok(s) => parse_client_args(s).map_err(|err| err.to_string()),
            Err(..) => Err("arguments are not UTF-8".to_owned()),
        };

        match parsed {
            Ok(args) => {
                PasswdAuthResponse::new(PasswdAuthResponse::SUCCEEDED)
                    .write_to(stream)
                    .await?;
                trace!("socks5 client sent {} transport arguments", args.len());
                Ok(args)
            }
            Err(msg) => {
                PasswdAuthResponse::new(PasswdAuthResponse::FAILURE)
                    .write_to(stream)
                    .await?;
                Err(io::Error::new(
                    ErrorKind::InvalidData,
                    format!("malformed transport arguments: {}", msg),
                ))
            }
        }
    }

    async fn handle_socks5_client(self: Arc<Self>, mut stream: TcpStream, peer_addr: SocketAddr) -> io::Result<()> {
        // 1. Handshake

        let handshake_req = match HandshakeRequest::read_from(&mut stream).await {
            Ok(r) => r,
            Err(Socks5Error::IoError(ref err)) if err.kind() == ErrorKind::UnexpectedEof => {
                trace!("socks5 handshake early eof. peer: {}", elide(&peer_addr));
                return Ok(());
            }
            Err(err) => {
                error!("socks5 handshake error: {}", err);
                return Err(err.into());
            }
        };

        trace!("socks5 {:?}", handshake_req);
        let args = self.check_auth(&mut stream, &handshake_req).await?;
        self.transport.configure_client(&args);

        // 2. Fetch headers

        let header = match TcpRequestHeader::read_from(&mut stream).await {
            Ok(h) => h,
            Err(err) => {
                error!("failed to get TcpRequestHeader: {}, peer: {}", err, elide(&peer_addr));
                TcpResponseHeader::failure(err.as_reply()).write_to(&mut stream).await?;
                return Err(err.into());
            }
        };

        // 3. Handle Command

        match header.command {
            Command::Connect => {
                debug!("CONNECT {}", elide(&header.address));
                self.handle_tcp_connect(stream, peer_addr, header.address).await
            }
            command => {
                warn!("socks5 {:?} is not supported", command);
                TcpResponseHeader::failure(Reply::CommandNotSupported)
                    .write_to(&mut stream)
                    .await?;
                Ok(())
            }
        }
    }

    async fn handle_tcp_connect(
        &self,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
        target_addr: Address,
    ) -> io::Result<()> {
        let mut remote = match self.dialer.connect(&target_addr).await {
            Ok(remote) => {
                // Tell the client that we are ready
                let header = TcpResponseHeader::new(Reply::Succeeded, Address::SocketAddress(remote.local_addr()?));
                header.write_to(&mut stream).await?;
                trace!("sent header: {:?}", header);

                remote
            }
            Err(err) => {
                TcpResponseHeader::failure(Reply::from_connect_error(&err))
                    .write_to(&mut stream)
                    .await?;
                return Err(err);
            }
        };

        establish_tcp_tunnel(&mut stream, &mut remote, peer_addr, &target_addr).await
    }
}
