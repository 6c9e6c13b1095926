//! Heartbeat liveness monitor
//!
//! A background task that periodically sweeps the node inventory and marks
//! nodes whose heartbeat is past the timeout as unhealthy, firing the
//! configured hook for each transition. Start is idempotent and stop is
//! deterministic: once stopped, no further sweep mutates state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use super::NodeManager;

/// Handle owning the liveness sweep task
pub struct HeartbeatMonitor {
    manager: Arc<NodeManager>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl HeartbeatMonitor {
    pub fn new(manager: Arc<NodeManager>) -> Self {
        Self {
            manager,
            shutdown: Mutex::new(None),
        }
    }

    /// Whether the sweep task is currently running
    pub fn is_running(&self) -> bool {
        self.shutdown.lock().expect("monitor lock poisoned").is_some()
    }

    /// Spawn the periodic sweep; calling again while running is a no-op
    pub fn start(&self) {
        let mut guard = self.shutdown.lock().expect("monitor lock poisoned");
        if guard.is_some() {
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let manager = self.manager.clone();
        let period = Duration::from_millis(manager.config().heartbeat_check_interval_ms.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick of tokio's interval fires immediately; skip it so
            // a freshly registered node is not swept before its first period.
            ticker.tick().await;

            info!(interval_ms = period.as_millis() as u64, "heartbeat monitor started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let transitioned = manager.sweep_stale_nodes(Utc::now());
                        if !transitioned.is_empty() {
                            debug!(count = transitioned.len(), "sweep marked nodes unhealthy");
                        }
                    }
                    _ = rx.changed() => {
                        if *rx.borrow() {
                            info!("heartbeat monitor shutting down");
                            break;
                        }
                    }
                }
            }
        });

        *guard = Some(tx);
    }

    /// Stop the sweep task; idempotent
    pub fn stop(&self) {
        if let Some(tx) = self
            .shutdown
            .lock()
            .expect("monitor lock poisoned")
            .take()
        {
            let _ = tx.send(true);
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
