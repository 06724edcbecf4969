use std::{net::SocketAddr, time::Duration};

use log::info;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time,
};

use shapeshifter_service::{
    launch_client,
    launch_server,
    shapeshifter_ipc::{parse_bindaddrs, ClientConfig, Messenger, ServerConfig, TransportOptions},
    ClientLaunch,
    ConnectionTracker,
    ProxyMode,
    ServerLaunch,
};

async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let (mut r, mut w) = stream.split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });

    addr
}

async fn echo_round_trip(stream: &mut TcpStream, payload: &[u8]) {
    stream.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, payload);
}

#[tokio::test]
async fn server_forwards_to_or_port() {
    let _ = env_logger::try_init();

    let or_addr = start_echo_server().await;
    let config = ServerConfig {
        bindaddrs: parse_bindaddrs("identity-127.0.0.1:0,obfs4-127.0.0.1:0", &TransportOptions::new()).unwrap(),
        or_addr,
        ext_or_addr: None,
        auth_cookie_path: None,
    };

    let tracker = ConnectionTracker::new();
    let mut messenger = Messenger::new(Vec::new());
    let result = launch_server(ProxyMode::Socks5, &ServerLaunch { config }, &tracker, &mut messenger).await;

    assert!(result.launched);
    assert_eq!(result.listeners.len(), 1);

    let server_addr = result.listeners[0].local_addr();
    let out = String::from_utf8(messenger.into_inner()).unwrap();
    assert_eq!(
        out,
        format!(
            "SMETHOD identity {}\nSMETHOD-ERROR obfs4 no such transport is supported\nSMETHODS DONE\n",
            server_addr
        )
    );

    let mut stream = TcpStream::connect(server_addr).await.unwrap();
    echo_round_trip(&mut stream, b"hello, OR port").await;
    assert_eq!(tracker.count(), 1);
}

#[tokio::test]
async fn socks5_client_connects() {
    let _ = env_logger::try_init();

    let target = start_echo_server().await;
    let launch = ClientLaunch {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        target: None,
        config: ClientConfig {
            method_names: vec!["identity".to_owned()],
            proxy: None,
        },
    };

    let tracker = ConnectionTracker::new();
    let mut messenger = Messenger::new(Vec::new());
    let mut result = launch_client(ProxyMode::Socks5, &launch, &tracker, &mut messenger).await;
    assert!(result.launched);

    let socks_addr = result.listeners[0].local_addr();
    let out = String::from_utf8(messenger.into_inner()).unwrap();
    assert_eq!(out, format!("CMETHOD identity socks5 {}\nCMETHODS DONE\n", socks_addr));

    let mut stream = TcpStream::connect(socks_addr).await.unwrap();

    // username/password carrying transport arguments
    stream.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
    let mut resp = [0u8; 2];
    stream.read_exact(&mut resp).await.unwrap();
    assert_eq!(resp, [0x05, 0x02]);

    stream.write_all(&[0x01, 3, b'a', b'=', b'1', 1, 0]).await.unwrap();
    stream.read_exact(&mut resp).await.unwrap();
    assert_eq!(resp, [0x01, 0x00]);

    let ip = match target {
        SocketAddr::V4(v4) => v4.ip().octets(),
        SocketAddr::V6(..) => unreachable!("echo server binds IPv4"),
    };
    let mut req = vec![0x05, 0x01, 0x00, 0x01];
    req.extend_from_slice(&ip);
    req.extend_from_slice(&target.port().to_be_bytes());
    stream.write_all(&req).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[1], 0x00, "CONNECT failed with reply {:#x}", reply[1]);

    echo_round_trip(&mut stream, b"through the socks5 listener").await;

    // Closing stops new connections, the established tunnel keeps working
    result.listeners[0].close().unwrap();
    info!("listener closed");
    time::sleep(Duration::from_millis(50)).await;

    assert!(TcpStream::connect(socks_addr).await.is_err());
    echo_round_trip(&mut stream, b"still here").await;
}

#[tokio::test]
async fn transparent_client_needs_target() {
    let _ = env_logger::try_init();

    let launch = ClientLaunch {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        target: None,
        config: ClientConfig {
            method_names: vec!["identity".to_owned()],
            proxy: None,
        },
    };

    let tracker = ConnectionTracker::new();
    let mut messenger = Messenger::new(Vec::new());
    let result = launch_client(ProxyMode::TransparentTcp, &launch, &tracker, &mut messenger).await;

    assert!(!result.launched);
    assert!(result.listeners.is_empty());

    let out = String::from_utf8(messenger.into_inner()).unwrap();
    assert!(out.starts_with("CMETHOD-ERROR identity "));
    assert!(out.ends_with("CMETHODS DONE\n"));
}
