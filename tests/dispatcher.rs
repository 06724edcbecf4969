use std::{
    env,
    fs,
    io::{BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
};

const DISPATCHER: &str = env!("CARGO_BIN_EXE_shapeshifter-dispatcher");

fn dispatcher() -> Command {
    let mut cmd = Command::new(DISPATCHER);
    for (name, _) in env::vars() {
        if name.starts_with("TOR_PT_") {
            cmd.env_remove(name);
        }
    }
    cmd
}

fn state_dir(name: &str) -> PathBuf {
    env::temp_dir().join(format!("shapeshifter-dispatcher-{}-{}", name, std::process::id()))
}

fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let mut stream = stream.unwrap();
            thread::spawn(move || {
                let mut buf = [0u8; 1024];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(..) => break,
                        Ok(n) => stream.write_all(&buf[..n]).unwrap(),
                    }
                }
            });
        }
    });

    addr
}

#[test]
fn prints_version() {
    let output = dispatcher().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        format!("dispatcher-{}\n", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn no_role_is_usage_error() {
    let state = state_dir("no-role");
    let output = dispatcher().arg("--state").arg(&state).output().unwrap();

    assert_eq!(output.status.code(), Some(sysexits::ExitCode::Usage as i32));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));

    let _ = fs::remove_dir_all(state);
}

#[test]
fn server_relays_until_stdin_closes() {
    let _ = env_logger::try_init();

    let or_addr = start_echo_server();
    let state = state_dir("server");

    let mut child = dispatcher()
        .arg("--server")
        .arg("--state")
        .arg(&state)
        .args(["--transports", "identity"])
        .args(["--bindaddr", "identity-127.0.0.1:0"])
        .args(["--orport", &or_addr.to_string()])
        .arg("--exit-on-stdin-close")
        .args(["--logLevel", "DEBUG", "--enableLogging"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        assert_ne!(stdout.read_line(&mut line).unwrap(), 0, "stdout closed after {:?}", lines);
        let line = line.trim_end().to_owned();
        let done = line == "SMETHODS DONE";
        lines.push(line);
        if done {
            break;
        }
    }

    assert_eq!(lines.len(), 2);
    let addr: SocketAddr = lines[0]
        .strip_prefix("SMETHOD identity ")
        .expect("SMETHOD line")
        .parse()
        .unwrap();

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(b"hello").unwrap();
    let mut buf = [0u8; 5];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello");

    drop(child.stdin.take());
    let status = child.wait().unwrap();
    assert!(status.success());

    assert!(state.join("dispatcher.log").is_file());
    let _ = fs::remove_dir_all(state);
}
