//! Eviction of expired sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::store::SessionStore;

/// When expired sessions are physically removed. Lookups never return an
/// expired session whatever the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapStrategy {
    /// `SessionStore::create` sweeps right after inserting.
    OnCreate,
    /// A [`Reaper`] task owned by the process sweeps on a fixed interval.
    Periodic(Duration),
    /// Only explicit `SessionStore::sweep` calls evict.
    Manual,
}

impl ReapStrategy {
    pub fn periodic_interval(&self) -> Option<Duration> {
        match self {
            ReapStrategy::Periodic(every) => Some(*every),
            _ => None,
        }
    }
}

/// Background task that sweeps a store on a fixed interval.
///
/// Ticks that fall behind are skipped rather than bunched, so a slow sweep
/// never queues up a burst of followers.
pub struct Reaper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<SessionStore>, every: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        debug!(removed, active = store.len(), "reaper tick");
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("session reaper stopped");
        });

        info!(interval_ms = every.as_millis() as u64, "session reaper started");
        Self { shutdown, handle }
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
