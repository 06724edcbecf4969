//! Live connection accounting

use std::sync::Arc;

use tokio::sync::watch;

/// Counts live connections and UDP associations
///
/// Cloning yields another handle on the same counter. Every update is published, so a
/// subscriber sees the count right after each connection opens or closes.
#[derive(Clone, Debug)]
pub struct ConnectionTracker {
    count: Arc<watch::Sender<usize>>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        ConnectionTracker {
            count: Arc::new(watch::Sender::new(0)),
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> ConnectionTracker {
        ConnectionTracker::default()
    }

    /// Registers a connection, which stays counted until the guard drops
    pub fn guard(&self) -> ConnectionGuard {
        self.count.send_modify(|n| *n += 1);
        ConnectionGuard {
            count: self.count.clone(),
        }
    }

    /// Current number of live connections
    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Receives the count after every change
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }
}

/// Keeps one connection counted in its [`ConnectionTracker`]
#[derive(Debug)]
pub struct ConnectionGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n -= 1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn guards_count() {
        let tracker = ConnectionTracker::new();
        let mut rx = tracker.subscribe();

        let a = tracker.guard();
        let b = tracker.clone().guard();
        assert_eq!(tracker.count(), 2);

        drop(a);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        drop(b);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 0);
    }
}
