//! Termination monitor
//!
//! Collects everything that may end the process into a single stream of [`TermEvent`]s:
//! signals, the parent process going away, stdin reaching EOF and, while draining, the
//! last tracked connection closing.

use std::{fmt, future, io};

use log::{debug, info};
use shapeshifter_service::ConnectionTracker;
use tokio::{
    io::AsyncReadExt,
    sync::{mpsc, watch},
    task::JoinHandle,
};

#[cfg(not(unix))]
mod other;
#[cfg(unix)]
mod unix;

#[cfg(not(unix))]
use self::other::spawn_platform_watchers;
#[cfg(unix)]
use self::unix::spawn_platform_watchers;

/// Something that asks the process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermEvent {
    /// SIGINT or Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    ParentExited,
    StdinClosed,
    /// The last tracked connection closed
    NoConnections,
}

impl fmt::Display for TermEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TermEvent::Interrupt => f.write_str("interrupt"),
            TermEvent::Terminate => f.write_str("terminate"),
            TermEvent::ParentExited => f.write_str("parent exited"),
            TermEvent::StdinClosed => f.write_str("stdin closed"),
            TermEvent::NoConnections => f.write_str("no connections"),
        }
    }
}

/// Waits for the next [`TermEvent`]
///
/// Owns the watcher tasks feeding it and stops them when dropped.
pub struct TermMonitor {
    events: mpsc::UnboundedReceiver<TermEvent>,
    connections: watch::Receiver<usize>,
    watchers: Vec<JoinHandle<()>>,
}

impl TermMonitor {
    /// Starts watching signals and the parent process, and stdin if `exit_on_stdin_close`
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(tracker: &ConnectionTracker, exit_on_stdin_close: bool) -> io::Result<TermMonitor> {
        let (tx, mut monitor) = TermMonitor::channel(tracker);

        monitor.watchers = spawn_platform_watchers(tx.clone())?;
        if exit_on_stdin_close {
            debug!("exiting when stdin closes");
            monitor.watchers.push(tokio::spawn(watch_stdin(tx)));
        }

        Ok(monitor)
    }

    /// A monitor fed only through the returned sender
    pub fn channel(tracker: &ConnectionTracker) -> (mpsc::UnboundedSender<TermEvent>, TermMonitor) {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = TermMonitor {
            events: rx,
            connections: tracker.subscribe(),
            watchers: Vec::new(),
        };
        (tx, monitor)
    }

    /// Next termination event
    ///
    /// With `wait_for_connections` a tracker update leaving no live connection also ends
    /// the wait, as [`TermEvent::NoConnections`]. Updates from before the call are ignored.
    pub async fn wait(&mut self, wait_for_connections: bool) -> TermEvent {
        let events = &mut self.events;
        let connections = &mut self.connections;

        // only updates from now on count
        if wait_for_connections {
            connections.borrow_and_update();
        }

        tokio::select! {
            Some(event) = events.recv() => event,
            event = no_connections(connections), if wait_for_connections => event,
            // every watcher is gone
            else => future::pending::<TermEvent>().await,
        }
    }
}

async fn no_connections(connections: &mut watch::Receiver<usize>) -> TermEvent {
    loop {
        if connections.changed().await.is_err() {
            future::pending::<()>().await;
        }
        let count = *connections.borrow_and_update();
        debug!("{} connections alive", count);
        if count == 0 {
            return TermEvent::NoConnections;
        }
    }
}

impl Drop for TermMonitor {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
    }
}

async fn watch_stdin(tx: mpsc::UnboundedSender<TermEvent>) {
    let mut stdin = tokio::io::stdin();
    let mut buffer = [0u8; 256];
    loop {
        match stdin.read(&mut buffer).await {
            Ok(0) => break,
            Ok(..) => continue,
            Err(err) => {
                debug!("stdin read failed: {}", err);
                break;
            }
        }
    }

    info!("stdin closed");
    let _ = tx.send(TermEvent::StdinClosed);
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time;

    use super::*;

    #[tokio::test]
    async fn events_in_order() {
        let tracker = ConnectionTracker::new();
        let (tx, mut monitor) = TermMonitor::channel(&tracker);

        tx.send(TermEvent::Interrupt).unwrap();
        tx.send(TermEvent::ParentExited).unwrap();
        assert_eq!(monitor.wait(false).await, TermEvent::Interrupt);
        assert_eq!(monitor.wait(false).await, TermEvent::ParentExited);
    }

    #[tokio::test]
    async fn connections_only_when_asked() {
        let tracker = ConnectionTracker::new();
        let (_tx, mut monitor) = TermMonitor::channel(&tracker);

        let guard = tracker.guard();
        drop(guard);

        // the count dropped to zero but nobody asked for it
        assert!(time::timeout(Duration::from_millis(50), monitor.wait(false)).await.is_err());

        let guard = tracker.guard();
        let waiter = tokio::spawn(async move { monitor.wait(true).await });
        time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        assert_eq!(waiter.await.unwrap(), TermEvent::NoConnections);
    }

    #[tokio::test]
    async fn stale_updates_ignored() {
        let tracker = ConnectionTracker::new();
        let (_tx, mut monitor) = TermMonitor::channel(&tracker);

        drop(tracker.guard());
        assert!(time::timeout(Duration::from_millis(50), monitor.wait(true)).await.is_err());
    }
}
