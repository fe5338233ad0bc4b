use async_trait::async_trait;
use chrono::Utc;
use futures_util::FutureExt;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use super::exit_watcher::{evaluate_sale, follow_exit, ExitContext, SaleVerdict};
use crate::ingestion::{StreamError, StreamFilter, Subscription};
use crate::models::{StreamEvent, TrackedWhale, WhaleKey};

/// Keeps exit detection running for the currently tracked whales.
#[async_trait]
pub trait ExitMatcher: Send + Sync {
    /// Start watches for tracked whales not yet watched. Returns the number of
    /// whales newly put under watch.
    async fn reconcile(&mut self, tracked: &[TrackedWhale]) -> usize;

    /// Whales currently under watch.
    async fn active(&self) -> usize;

    /// Abort every running watch.
    async fn shutdown(&mut self);
}

type WatchHandle = JoinHandle<Result<SaleVerdict, StreamError>>;

// ---------------------------------------------------------------------------
// One subscription per whale
// ---------------------------------------------------------------------------

/// A running watch and the channel that feeds it the key's latest entry.
struct Watch {
    entry: watch::Sender<TrackedWhale>,
    handle: WatchHandle,
}

pub struct PerWhaleWatchers {
    ctx: ExitContext,
    tasks: HashMap<WhaleKey, Watch>,
}

impl PerWhaleWatchers {
    pub fn new(ctx: ExitContext) -> Self {
        Self {
            ctx,
            tasks: HashMap::new(),
        }
    }

    /// Drop finished tasks and log how they ended.
    fn reap(&mut self) {
        let finished: Vec<WhaleKey> = self
            .tasks
            .iter()
            .filter(|(_, watch)| watch.handle.is_finished())
            .map(|(key, _)| key.clone())
            .collect();

        for key in finished {
            let Some(watch) = self.tasks.remove(&key) else {
                continue;
            };
            match watch.handle.now_or_never() {
                Some(Ok(Ok(verdict))) => {
                    tracing::info!(whale = %key, verdict = ?verdict, "Exit watch finished");
                }
                Some(Ok(Err(e))) => {
                    tracing::warn!(
                        whale = %key,
                        error = %e,
                        "Exit watch abandoned, will restart next cycle"
                    );
                }
                Some(Err(e)) => {
                    tracing::error!(whale = %key, error = %e, "Exit watch task failed");
                }
                None => {}
            }
        }
    }
}

#[async_trait]
impl ExitMatcher for PerWhaleWatchers {
    /// Running watches are never cancelled here, even when their key has left
    /// `tracked`; they end on a match or when their retries run out.
    async fn reconcile(&mut self, tracked: &[TrackedWhale]) -> usize {
        self.reap();

        let mut started = 0;
        for whale in tracked {
            let key = whale.key();
            if let Some(running) = self.tasks.get(&key) {
                running.entry.send_if_modified(|current| {
                    if *current == *whale {
                        return false;
                    }
                    tracing::info!(whale = %key, "Newer entry for watched key, threshold updated");
                    *current = whale.clone();
                    true
                });
                continue;
            }
            let (entry, current) = watch::channel(whale.clone());
            let handle = tokio::spawn(follow_exit(current, self.ctx.clone()));
            self.tasks.insert(key, Watch { entry, handle });
            started += 1;
        }
        started
    }

    async fn active(&self) -> usize {
        self.tasks.len()
    }

    async fn shutdown(&mut self) {
        for (_, watch) in self.tasks.drain() {
            watch.handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// One subscription for all whales
// ---------------------------------------------------------------------------

/// Tracked whales indexed by lowercase address.
type WhaleIndex = Arc<RwLock<HashMap<String, Vec<TrackedWhale>>>>;

pub struct SharedSellStream {
    ctx: ExitContext,
    index: WhaleIndex,
    addresses: BTreeSet<String>,
    task: Option<JoinHandle<StreamError>>,
}

impl SharedSellStream {
    pub fn new(ctx: ExitContext) -> Self {
        Self {
            ctx,
            index: Arc::new(RwLock::new(HashMap::new())),
            addresses: BTreeSet::new(),
            task: None,
        }
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl ExitMatcher for SharedSellStream {
    /// New whales join the index and newer entries replace older ones for the
    /// same key. Entries leave only on a terminal verdict, or once the
    /// subscription serving them has exhausted its retries while their key is
    /// no longer tracked.
    async fn reconcile(&mut self, tracked: &[TrackedWhale]) -> usize {
        let task_dead = self.task.as_ref().map_or(true, |t| t.is_finished());

        let (started, addresses) = {
            let mut index = self.index.write().await;

            if task_dead && self.task.is_some() {
                let wanted: HashSet<WhaleKey> = tracked.iter().map(TrackedWhale::key).collect();
                for list in index.values_mut() {
                    list.retain(|w| wanted.contains(&w.key()));
                }
                index.retain(|_, list| !list.is_empty());
            }

            let mut started = 0;
            for whale in tracked {
                let list = index.entry(whale.address.to_ascii_lowercase()).or_default();
                match list.iter_mut().find(|w| w.key() == whale.key()) {
                    Some(existing) => {
                        if *existing != *whale {
                            *existing = whale.clone();
                        }
                    }
                    None => {
                        list.push(whale.clone());
                        started += 1;
                    }
                }
            }

            let addresses: BTreeSet<String> = index.keys().cloned().collect();
            (started, addresses)
        };

        if addresses != self.addresses || task_dead {
            self.stop_task();
            self.addresses = addresses;

            if !self.addresses.is_empty() {
                tracing::info!(
                    addresses = self.addresses.len(),
                    "Restarting shared sell subscription"
                );
                let filter = StreamFilter::SellsByAny {
                    addresses: self.addresses.iter().cloned().collect(),
                };
                let subscription =
                    Subscription::new(self.ctx.source.clone(), filter, self.ctx.retry);
                self.task = Some(tokio::spawn(run_shared(
                    subscription,
                    self.index.clone(),
                    self.ctx.clone(),
                )));
            }
        }

        started
    }

    async fn active(&self) -> usize {
        self.index.read().await.values().map(Vec::len).sum()
    }

    async fn shutdown(&mut self) {
        self.stop_task();
        self.index.write().await.clear();
    }
}

/// Route each sale to the indexed whales of its seller. Matched whales leave
/// the index.
async fn run_shared(mut subscription: Subscription, index: WhaleIndex, ctx: ExitContext) -> StreamError {
    loop {
        let sale = match subscription.next_event().await {
            Ok(StreamEvent::Trade(sale)) => sale,
            Ok(StreamEvent::PoolCreated(_)) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Shared sell subscription abandoned");
                return e;
            }
        };

        let seller = sale.actor_address.to_ascii_lowercase();
        let candidates = index.read().await.get(&seller).cloned().unwrap_or_default();

        for whale in candidates.iter().filter(|w| sale.is_on_pair(&w.pair)) {
            match evaluate_sale(whale, &sale, &ctx, Utc::now()).await {
                Ok(verdict) if verdict.is_terminal() => {
                    let mut index = index.write().await;
                    if let Some(list) = index.get_mut(&seller) {
                        list.retain(|w| w.key() != whale.key());
                        if list.is_empty() {
                            index.remove(&seller);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        wallet = %whale.address,
                        pair = %whale.pair,
                        "Exit processing failed, event dropped"
                    );
                }
            }
        }
    }
}
