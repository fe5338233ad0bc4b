use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;

use whalewatch::db::{self, SqliteWhaleStore};
use whalewatch::ingestion::{EventStream, RetryPolicy, StreamError, StreamFilter, TradeSource};
use whalewatch::intelligence::{LiquidityOracle, LiquidityReading};
use whalewatch::models::{PoolCreated, Side, StreamEvent, TradeEvent};
use whalewatch::services::AlertSink;

#[allow(dead_code)]
pub const WHALE: &str = "0xabc0000000000000000000000000000000000001";
#[allow(dead_code)]
pub const POOL: &str = "0xpool00000000000000000000000000000000cake";

/// Fresh in-memory store with migrations applied.
#[allow(dead_code)]
pub async fn setup_store() -> Arc<SqliteWhaleStore> {
    let pool = db::init_memory_pool()
        .await
        .expect("Failed to open in-memory database");
    Arc::new(SqliteWhaleStore::new(pool))
}

/// Retry policy with a negligible delay.
#[allow(dead_code)]
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(1),
    }
}

#[allow(dead_code)]
pub fn buy(address: &str, amount_usd: i64, token_amount: i64) -> TradeEvent {
    TradeEvent {
        actor_address: address.into(),
        pair_id: POOL.into(),
        token0_symbol: "CAKE".into(),
        token1_symbol: "WBNB".into(),
        amount_usd: Decimal::from(amount_usd),
        token_amount: Decimal::from(token_amount),
        side: Side::Buy,
        tx_hash: None,
    }
}

#[allow(dead_code)]
pub fn sell(address: &str, token_amount: i64) -> TradeEvent {
    TradeEvent {
        amount_usd: Decimal::from(token_amount * 10),
        side: Side::Sell,
        ..buy(address, 0, token_amount)
    }
}

#[allow(dead_code)]
pub fn new_pool(pool_id: &str) -> PoolCreated {
    PoolCreated {
        pool_id: pool_id.into(),
        token0_symbol: "NEW".into(),
        token1_symbol: "WBNB".into(),
    }
}

/// Poll `check` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// ScriptedSource: a TradeSource that replays canned sessions
// ---------------------------------------------------------------------------

/// One `open` call's outcome.
#[allow(dead_code)]
pub enum Script {
    /// `open` itself fails.
    Refuse,
    /// Deliver the events, then end the stream.
    Deliver(Vec<StreamEvent>),
    /// Deliver the events, then fail mid-stream.
    DeliverThenFail(Vec<StreamEvent>),
    /// Deliver the events, then stay open forever.
    DeliverThenHang(Vec<StreamEvent>),
}

/// Scripts are queued per filter key. An empty queue refuses the open.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    opened: Mutex<Vec<StreamFilter>>,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, filter_key: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .entry(filter_key.to_string())
            .or_default()
            .push_back(script);
    }

    pub fn opens(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn opened(&self) -> Vec<StreamFilter> {
        self.opened.lock().unwrap().clone()
    }

    /// Queue key for a filter: `buys`, `sells:<address>`, `sells_any`, `pools`.
    pub fn key(filter: &StreamFilter) -> String {
        match filter {
            StreamFilter::Buys { .. } => "buys".into(),
            StreamFilter::SellsBy { address } => format!("sells:{address}"),
            StreamFilter::SellsByAny { .. } => "sells_any".into(),
            StreamFilter::NewPools => "pools".into(),
        }
    }
}

#[async_trait]
impl TradeSource for ScriptedSource {
    async fn open(&self, filter: &StreamFilter) -> Result<EventStream, StreamError> {
        self.opened.lock().unwrap().push(filter.clone());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&Self::key(filter))
            .and_then(VecDeque::pop_front);

        let ok = |events: Vec<StreamEvent>| stream::iter(events.into_iter().map(Ok::<StreamEvent, StreamError>));

        match script {
            None | Some(Script::Refuse) => Err(StreamError::Connect("connection refused".into())),
            Some(Script::Deliver(events)) => Ok(ok(events).boxed()),
            Some(Script::DeliverThenFail(events)) => Ok(ok(events)
                .chain(stream::once(async {
                    Err(StreamError::Protocol("reset by peer".into()))
                }))
                .boxed()),
            Some(Script::DeliverThenHang(events)) => Ok(ok(events).chain(stream::pending()).boxed()),
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle and alert doubles
// ---------------------------------------------------------------------------

pub struct StubOracle {
    liquidity: Mutex<LiquidityReading>,
    balance: Decimal,
    lookups: AtomicUsize,
}

#[allow(dead_code)]
impl StubOracle {
    pub fn known(liquidity: i64) -> Arc<Self> {
        Self::with(LiquidityReading::Known(Decimal::from(liquidity)))
    }

    pub fn with(reading: LiquidityReading) -> Arc<Self> {
        Arc::new(Self {
            liquidity: Mutex::new(reading),
            balance: Decimal::from(850),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, reading: LiquidityReading) {
        *self.liquidity.lock().unwrap() = reading;
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiquidityOracle for StubOracle {
    async fn liquidity(&self, _pair_id: &str) -> LiquidityReading {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        *self.liquidity.lock().unwrap()
    }

    async fn wallet_balance(&self, _address: &str, _token_id: &str) -> Decimal {
        self.balance
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    sent: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingAlerts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }
}

#[async_trait]
impl AlertSink for RecordingAlerts {
    async fn send(&self, message: &str) {
        self.sent.lock().unwrap().push(message.to_string());
    }
}
