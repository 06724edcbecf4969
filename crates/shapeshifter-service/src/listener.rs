//! Listener handles returned by the mode launchers

use std::{io, net::SocketAddr};

use log::trace;
use tokio::task::JoinHandle;

/// A running accept (or receive) loop
///
/// Connections already accepted run in their own tasks, so closing a listener only stops
/// new ones. Dropping the handle closes the listener too.
#[derive(Debug)]
pub struct Listener {
    method_name: String,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    pub(crate) fn new(method_name: &str, local_addr: SocketAddr, handle: JoinHandle<()>) -> Listener {
        Listener {
            method_name: method_name.to_owned(),
            local_addr,
            handle: Some(handle),
        }
    }

    /// Transport this listener serves
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Stops accepting. Never blocks; fails if the listener was already closed.
    pub fn close(&mut self) -> io::Result<()> {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                trace!("{} listener {} closed", self.method_name, self.local_addr);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} listener {} is already closed", self.method_name, self.local_addr),
            )),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod test {
    use std::future;

    use super::*;

    #[tokio::test]
    async fn close_once() {
        let handle = tokio::spawn(future::pending::<()>());
        let mut listener = Listener::new("identity", "127.0.0.1:1".parse().unwrap(), handle);

        assert!(!listener.is_closed());
        listener.close().unwrap();
        assert!(listener.is_closed());
        assert_eq!(listener.close().unwrap_err().kind(), io::ErrorKind::NotConnected);
    }
}
