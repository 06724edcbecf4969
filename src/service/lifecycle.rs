//! Process lifecycle
//!
//! ```plain
//! Initializing -> Resolving -> Dispatching -> Running -> Draining -> Terminated
//!                     |             |            |                      ^
//!                     +-------------+------------+----------------------+
//! ```
//!
//! Resolution and launch failures end the process straight from their phase. While
//! running, the first interrupt closes every listener and starts draining; a terminate
//! signal, the parent exiting or stdin closing ends the process at once. Draining ends
//! on the next event of any kind, including the last tracked connection closing.

use std::fmt;

use log::{debug, info, warn};
use shapeshifter_service::Listener;

use crate::monitor::{TermEvent, TermMonitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Initializing,
    Resolving,
    Dispatching,
    Running,
    Draining,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Phase::Initializing => f.write_str("initializing"),
            Phase::Resolving => f.write_str("resolving"),
            Phase::Dispatching => f.write_str("dispatching"),
            Phase::Running => f.write_str("running"),
            Phase::Draining => f.write_str("draining"),
            Phase::Terminated => f.write_str("terminated"),
        }
    }
}

/// Tracks the current [`Phase`], phases only move forward
#[derive(Debug)]
pub struct Lifecycle {
    phase: Phase,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle {
            phase: Phase::Initializing,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Lifecycle {
        Lifecycle::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn enter(&mut self, phase: Phase) {
        debug_assert!(phase > self.phase, "{} cannot follow {}", phase, self.phase);
        debug!("lifecycle {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs from `Running` until the process should exit, returning the final event
    ///
    /// `listeners` are closed when draining starts and never touched again.
    pub async fn supervise(&mut self, monitor: &mut TermMonitor, listeners: &mut [Listener]) -> TermEvent {
        self.enter(Phase::Running);

        let event = monitor.wait(false).await;
        if event != TermEvent::Interrupt {
            info!("{}, exiting", event);
            self.enter(Phase::Terminated);
            return event;
        }

        info!("{}, closing {} listeners and draining connections", event, listeners.len());
        self.enter(Phase::Draining);
        for listener in listeners.iter_mut() {
            if let Err(err) = listener.close() {
                warn!("failed to close {} listener: {}", listener.method_name(), err);
            }
        }

        let event = monitor.wait(true).await;
        info!("{}, exiting", event);
        self.enter(Phase::Terminated);
        event
    }
}
