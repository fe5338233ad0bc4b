use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

/// Liveness flags shared between the background tasks and the HTTP surface.
#[derive(Debug, Default)]
pub struct EngineStatus {
    entry_stream_alive: AtomicBool,
    pool_stream_alive: AtomicBool,
    tracked: AtomicUsize,
    active_watchers: AtomicUsize,
    last_tick: AtomicI64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub entry_stream_alive: bool,
    pub pool_stream_alive: bool,
    pub tracked_whales: usize,
    pub active_exit_watchers: usize,
    pub last_scheduler_tick: Option<DateTime<Utc>>,
}

impl EngineStatus {
    pub fn set_entry_stream_alive(&self, alive: bool) {
        self.entry_stream_alive.store(alive, Ordering::Relaxed);
    }

    pub fn set_pool_stream_alive(&self, alive: bool) {
        self.pool_stream_alive.store(alive, Ordering::Relaxed);
    }

    pub fn entry_stream_alive(&self) -> bool {
        self.entry_stream_alive.load(Ordering::Relaxed)
    }

    pub fn record_tick(&self, tracked: usize, active_watchers: usize, at: DateTime<Utc>) {
        self.tracked.store(tracked, Ordering::Relaxed);
        self.active_watchers.store(active_watchers, Ordering::Relaxed);
        self.last_tick.store(at.timestamp(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let last = self.last_tick.load(Ordering::Relaxed);
        StatusSnapshot {
            entry_stream_alive: self.entry_stream_alive.load(Ordering::Relaxed),
            pool_stream_alive: self.pool_stream_alive.load(Ordering::Relaxed),
            tracked_whales: self.tracked.load(Ordering::Relaxed),
            active_exit_watchers: self.active_watchers.load(Ordering::Relaxed),
            last_scheduler_tick: if last > 0 {
                Utc.timestamp_opt(last, 0).single()
            } else {
                None
            },
        }
    }
}
