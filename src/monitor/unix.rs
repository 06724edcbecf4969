use std::{io, os::unix::process::parent_id, time::Duration};

use futures::future::{self, Either, FutureExt};
use log::{info, warn};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::mpsc,
    task::JoinHandle,
    time,
};

use super::TermEvent;

const PARENT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns the `SIGTERM`/`SIGINT` watcher and the parent process watcher
pub fn spawn_platform_watchers(tx: mpsc::UnboundedSender<TermEvent>) -> io::Result<Vec<JoinHandle<()>>> {
    // Can fail if setting up signal monitoring fails
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let signals_tx = tx.clone();
    let signals = tokio::spawn(async move {
        loop {
            let (signal_name, event) = match future::select(sigterm.recv().boxed(), sigint.recv().boxed()).await {
                Either::Left((Some(..), ..)) => ("SIGTERM", TermEvent::Terminate),
                Either::Right((Some(..), ..)) => ("SIGINT", TermEvent::Interrupt),
                _ => break,
            };

            info!("received {}", signal_name);
            if signals_tx.send(event).is_err() {
                break;
            }
        }
    });

    let parent = tokio::spawn(watch_parent(tx));

    Ok(vec![signals, parent])
}

/// Polls the parent pid, an orphaned process gets re-parented
async fn watch_parent(tx: mpsc::UnboundedSender<TermEvent>) {
    let original = parent_id();
    if original == 1 {
        warn!("parent is already pid 1, parent exit cannot be detected");
        return;
    }

    let mut interval = time::interval(PARENT_POLL_INTERVAL);
    loop {
        interval.tick().await;

        let current = parent_id();
        if current != original {
            info!("parent process {} exited", original);
            let _ = tx.send(TermEvent::ParentExited);
            break;
        }
    }
}
