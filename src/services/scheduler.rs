use chrono::Utc;
use metrics::gauge;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use super::backup::export_backup;
use super::exit_matcher::ExitMatcher;
use super::status::EngineStatus;
use crate::db::{StoreError, WhaleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tracked: usize,
    pub started: usize,
    pub active: usize,
}

/// Periodic reconciliation of exit watches against the store, plus backup.
pub struct Scheduler {
    store: Arc<dyn WhaleStore>,
    matcher: Box<dyn ExitMatcher>,
    period: Duration,
    backup_path: Option<PathBuf>,
    status: Arc<EngineStatus>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn WhaleStore>,
        matcher: Box<dyn ExitMatcher>,
        period: Duration,
        backup_path: Option<PathBuf>,
        status: Arc<EngineStatus>,
    ) -> Self {
        Self {
            store,
            matcher,
            period,
            backup_path,
            status,
        }
    }

    /// One cycle:
    /// 1. Scan tracked whales
    /// 2. Start a watch for every whale without one
    /// 3. Export the backup file, if configured
    ///
    /// A backup failure is logged and does not fail the tick.
    pub async fn tick(&mut self) -> Result<TickReport, StoreError> {
        let tracked = self.store.scan_tracked().await?;
        let started = self.matcher.reconcile(&tracked).await;
        let active = self.matcher.active().await;

        gauge!("tracked_whales").set(tracked.len() as f64);
        gauge!("active_exit_watchers").set(active as f64);
        self.status.record_tick(tracked.len(), active, Utc::now());

        if started > 0 {
            tracing::info!(tracked = tracked.len(), started, active, "Exit watches started");
        } else {
            tracing::debug!(tracked = tracked.len(), active, "Scheduler tick");
        }

        if let Some(path) = &self.backup_path {
            match export_backup(self.store.as_ref(), path).await {
                Ok(count) => {
                    tracing::debug!(path = %path.display(), records = count, "Backup written");
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Backup export failed");
                }
            }
        }

        Ok(TickReport {
            tracked: tracked.len(),
            started,
            active,
        })
    }

    /// Tick every period until `shutdown` flips to true, then abort all watches.
    /// The first tick runs immediately.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(period_secs = self.period.as_secs(), "Scheduler started");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Scheduler: failed to scan tracked whales");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.matcher.shutdown().await;
        tracing::info!("Scheduler stopped, exit watches aborted");
    }
}
