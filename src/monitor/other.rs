use std::io;

use log::info;
use tokio::{signal, sync::mpsc, task::JoinHandle};

use super::TermEvent;

/// Spawns the Ctrl-C watcher, the only event source on this platform
pub fn spawn_platform_watchers(tx: mpsc::UnboundedSender<TermEvent>) -> io::Result<Vec<JoinHandle<()>>> {
    let ctrl_c = tokio::spawn(async move {
        while signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C");
            if tx.send(TermEvent::Interrupt).is_err() {
                break;
            }
        }
    });

    Ok(vec![ctrl_c])
}
