//! Managed proxy status messages
//!
//! The parent process reads one message per line from our standard output:
//!
//! ```plain
//! VERSION 2
//! PROXY DONE
//! CMETHOD obfs4 socks5 127.0.0.1:45321
//! CMETHODS DONE
//! ```

use std::{
    fmt,
    io::{self, Write},
    net::SocketAddr,
};

use log::{trace, warn};

use crate::args::Args;

/// Writes status messages, one line each, flushing after every line
#[derive(Debug)]
pub struct Messenger<W: Write> {
    writer: W,
}

impl Messenger<io::Stdout> {
    /// Messages on the process' standard output
    pub fn stdout() -> Messenger<io::Stdout> {
        Messenger::new(io::stdout())
    }
}

impl<W: Write> Messenger<W> {
    pub fn new(writer: W) -> Messenger<W> {
        Messenger { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        // Message text is free-form, but a newline would start a bogus message
        let line = args.to_string().replace(['\r', '\n'], " ");
        trace!("ipc: {}", line);

        let result = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush());
        if let Err(err) = result {
            warn!("failed to write \"{}\" to parent, error: {}", line, err);
        }
    }

    pub fn version(&mut self, version: &str) {
        self.line(format_args!("VERSION {}", version));
    }

    pub fn version_error(&mut self) {
        self.line(format_args!("VERSION-ERROR no-version"));
    }

    pub fn env_error(&mut self, msg: &str) {
        self.line(format_args!("ENV-ERROR {}", msg));
    }

    pub fn proxy_done(&mut self) {
        self.line(format_args!("PROXY DONE"));
    }

    pub fn proxy_error(&mut self, msg: &str) {
        self.line(format_args!("PROXY-ERROR {}", msg));
    }

    /// A client transport is listening at `addr`, speaking `protocol` (`socks5`, `transparent-TCP`, ...)
    pub fn cmethod(&mut self, name: &str, protocol: &str, addr: SocketAddr) {
        self.line(format_args!("CMETHOD {} {} {}", name, protocol, addr));
    }

    pub fn cmethod_error(&mut self, name: &str, msg: &str) {
        self.line(format_args!("CMETHOD-ERROR {} {}", name, msg));
    }

    pub fn cmethods_done(&mut self) {
        self.line(format_args!("CMETHODS DONE"));
    }

    /// A server transport is listening at `addr`
    pub fn smethod(&mut self, name: &str, addr: SocketAddr, args: &Args) {
        if args.is_empty() {
            self.line(format_args!("SMETHOD {} {}", name, addr));
        } else {
            self.line(format_args!("SMETHOD {} {} ARGS:{}", name, addr, args.encode()));
        }
    }

    pub fn smethod_error(&mut self, name: &str, msg: &str) {
        self.line(format_args!("SMETHOD-ERROR {} {}", name, msg));
    }

    pub fn smethods_done(&mut self) {
        self.line(format_args!("SMETHODS DONE"));
    }
}
