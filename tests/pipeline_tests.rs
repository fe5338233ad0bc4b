mod common;

use chrono::{Duration, Utc};
use std::sync::Arc;

use whalewatch::db::WhaleStore;
use whalewatch::ingestion::pipeline::{EntryOutcome, EntryPipeline};
use whalewatch::ingestion::pool_discovery::{handle_new_pool, run_pool_discovery};
use whalewatch::ingestion::{StreamError, StreamFilter, Subscription};
use whalewatch::intelligence::{AdmissionPolicy, LiquidityBand, LiquidityReading, Rejection};
use whalewatch::models::{StreamEvent, WhaleStatus};

use common::{buy, fast_retry, new_pool, RecordingAlerts, Script, ScriptedSource, StubOracle, WHALE};

struct Harness {
    store: Arc<whalewatch::db::SqliteWhaleStore>,
    oracle: Arc<StubOracle>,
    alerts: Arc<RecordingAlerts>,
    pipeline: EntryPipeline,
}

async fn harness(liquidity: LiquidityReading) -> Harness {
    let store = common::setup_store().await;
    let oracle = StubOracle::with(liquidity);
    let alerts = RecordingAlerts::new();
    let pipeline = EntryPipeline::new(
        store.clone(),
        oracle.clone(),
        alerts.clone(),
        AdmissionPolicy::default(),
    );
    Harness {
        store,
        oracle,
        alerts,
        pipeline,
    }
}

fn known(v: i64) -> LiquidityReading {
    LiquidityReading::Known(v.into())
}

#[tokio::test]
async fn test_qualifying_buy_is_recorded_and_alerted() {
    let h = harness(known(80_000)).await;

    let outcome = h
        .pipeline
        .process_trade(&buy(WHALE, 150_000, 1_000), Utc::now())
        .await
        .expect("Pipeline should succeed");

    let EntryOutcome::Recorded(record) = outcome else {
        panic!("Expected a recorded entry, got {outcome:?}");
    };
    assert_eq!(record.address, WHALE);
    assert_eq!(record.pair, "CAKE/WBNB");
    assert_eq!(record.status, WhaleStatus::Tracked);

    let tracked = h.store.scan_tracked().await.unwrap();
    assert_eq!(tracked.len(), 1);

    let messages = h.alerts.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Whale Entry"));
    assert!(messages[0].contains(WHALE));
}

#[tokio::test]
async fn test_thin_pool_is_suppressed() {
    let h = harness(known(20_000)).await;

    let outcome = h
        .pipeline
        .process_trade(&buy(WHALE, 150_000, 1_000), Utc::now())
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        EntryOutcome::Suppressed(Rejection::LiquidityOutOfBand { .. })
    ));
    assert!(h.store.export_all().await.unwrap().is_empty());
    assert!(h.alerts.messages().is_empty());
}

#[tokio::test]
async fn test_below_floor_skips_liquidity_lookup() {
    let h = harness(known(80_000)).await;

    let outcome = h
        .pipeline
        .process_trade(&buy(WHALE, 99_999, 1_000), Utc::now())
        .await
        .unwrap();

    assert!(matches!(outcome, EntryOutcome::Suppressed(Rejection::BelowFloor { .. })));
    assert_eq!(h.oracle.lookups(), 0);
    assert!(h.store.export_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unavailable_liquidity_fails_closed() {
    let h = harness(LiquidityReading::Unavailable).await;

    let outcome = h
        .pipeline
        .process_trade(&buy(WHALE, 500_000, 1_000), Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome, EntryOutcome::Suppressed(Rejection::LiquidityUnavailable));
    assert!(h.store.export_all().await.unwrap().is_empty());
    assert!(h.alerts.messages().is_empty());
}

#[tokio::test]
async fn test_cooldown_suppresses_repeat_entries() {
    let h = harness(known(80_000)).await;
    let t = Utc::now();
    let trade = buy(WHALE, 150_000, 1_000);

    let first = h.pipeline.process_trade(&trade, t).await.unwrap();
    assert!(matches!(first, EntryOutcome::Recorded(_)));

    let within = h
        .pipeline
        .process_trade(&trade, t + Duration::minutes(30))
        .await
        .unwrap();
    assert!(matches!(
        within,
        EntryOutcome::Suppressed(Rejection::CoolingDown { .. })
    ));

    let after = h
        .pipeline
        .process_trade(&trade, t + Duration::minutes(61))
        .await
        .unwrap();
    assert!(matches!(after, EntryOutcome::Recorded(_)));

    assert_eq!(h.store.export_all().await.unwrap().len(), 2);
    assert_eq!(h.alerts.count_containing("Whale Entry"), 2);
    // Still one tracked position per key.
    assert_eq!(h.store.scan_tracked().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cooldown_is_per_pair() {
    let h = harness(known(80_000)).await;
    let t = Utc::now();

    h.pipeline
        .process_trade(&buy(WHALE, 150_000, 1_000), t)
        .await
        .unwrap();

    let mut other_pair = buy(WHALE, 150_000, 1_000);
    other_pair.token0_symbol = "BUSD".into();
    let outcome = h
        .pipeline
        .process_trade(&other_pair, t + Duration::minutes(1))
        .await
        .unwrap();
    assert!(matches!(outcome, EntryOutcome::Recorded(_)));
}

#[tokio::test]
async fn test_mixed_case_wallet_shares_cooldown() {
    let h = harness(known(80_000)).await;
    let t = Utc::now();

    let first = h
        .pipeline
        .process_trade(&buy(WHALE, 150_000, 1_000), t)
        .await
        .unwrap();
    let EntryOutcome::Recorded(record) = first else {
        panic!("Expected a recorded entry, got {first:?}");
    };
    assert_eq!(record.address, WHALE);

    let shouted = WHALE.to_uppercase().replace("0X", "0x");
    let again = h
        .pipeline
        .process_trade(&buy(&shouted, 150_000, 1_000), t + Duration::minutes(5))
        .await
        .unwrap();
    assert!(matches!(
        again,
        EntryOutcome::Suppressed(Rejection::CoolingDown { .. })
    ));
    assert_eq!(h.store.export_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_failure_sends_nothing() {
    let h = harness(known(80_000)).await;
    h.store.pool().close().await;

    let result = h
        .pipeline
        .process_trade(&buy(WHALE, 150_000, 1_000), Utc::now())
        .await;

    assert!(result.is_err());
    assert!(h.alerts.messages().is_empty());
}

// ---------------------------------------------------------------------------
// Reconnect behaviour through the pipeline's run loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_counter_resets_after_successful_reconnect() {
    let h = harness(known(80_000)).await;
    let source = ScriptedSource::new();

    for _ in 0..4 {
        source.push("buys", Script::Refuse);
    }
    source.push(
        "buys",
        Script::Deliver(vec![StreamEvent::Trade(buy(WHALE, 150_000, 1_000))]),
    );
    // Queue exhausted afterwards: every further open is refused.

    let subscription = Subscription::new(
        source.clone(),
        StreamFilter::Buys {
            min_usd: 100_000.into(),
        },
        fast_retry(5),
    );
    let err = h.pipeline.run(subscription).await;

    assert!(matches!(err, StreamError::RetriesExhausted { attempts: 5, .. }));
    // 4 refused + 1 successful, then end-of-stream + 4 refused = fresh budget of 5.
    assert_eq!(source.opens(), 9);
    assert_eq!(h.store.scan_tracked().await.unwrap().len(), 1);
    assert_eq!(h.alerts.count_containing("Whale Entry"), 1);
}

#[tokio::test]
async fn test_five_consecutive_failures_abandon_the_stream() {
    let h = harness(known(80_000)).await;
    let source = ScriptedSource::new();

    let subscription = Subscription::new(
        source.clone(),
        StreamFilter::Buys {
            min_usd: 100_000.into(),
        },
        fast_retry(5),
    );
    let err = h.pipeline.run(subscription).await;

    assert!(err.is_terminal());
    assert_eq!(source.opens(), 5);
}

#[tokio::test]
async fn test_mid_stream_error_counts_as_failure() {
    let h = harness(known(80_000)).await;
    let source = ScriptedSource::new();
    source.push(
        "buys",
        Script::DeliverThenFail(vec![StreamEvent::Trade(buy(WHALE, 150_000, 1_000))]),
    );
    source.push(
        "buys",
        Script::Deliver(vec![StreamEvent::Trade(buy("0xsecond", 150_000, 1_000))]),
    );

    let subscription = Subscription::new(
        source.clone(),
        StreamFilter::Buys {
            min_usd: 100_000.into(),
        },
        fast_retry(2),
    );
    let err = h.pipeline.run(subscription).await;

    assert!(matches!(err, StreamError::RetriesExhausted { attempts: 2, .. }));
    let all = h.store.export_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].address, WHALE);
    assert_eq!(all[1].address, "0xsecond");
}

// ---------------------------------------------------------------------------
// Pool discovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_new_pool_alert_respects_band() {
    let alerts = RecordingAlerts::new();
    let band = LiquidityBand::default();

    let inside = StubOracle::known(120_000);
    assert!(handle_new_pool(&new_pool("0xp1"), inside.as_ref(), alerts.as_ref(), &band).await);

    let outside = StubOracle::known(5_000_000);
    assert!(!handle_new_pool(&new_pool("0xp2"), outside.as_ref(), alerts.as_ref(), &band).await);

    let unknown = StubOracle::with(LiquidityReading::Unavailable);
    assert!(!handle_new_pool(&new_pool("0xp3"), unknown.as_ref(), alerts.as_ref(), &band).await);

    let messages = alerts.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("New Pool"));
    assert!(messages[0].contains("NEW/WBNB"));
}

#[tokio::test]
async fn test_new_pool_alert_with_multibyte_id() {
    let alerts = RecordingAlerts::new();
    let oracle = StubOracle::known(120_000);

    let sent = handle_new_pool(
        &new_pool("0xpooéabcdefgh"),
        oracle.as_ref(),
        alerts.as_ref(),
        &LiquidityBand::default(),
    )
    .await;

    assert!(sent);
    assert_eq!(alerts.count_containing("0xpooé...efgh"), 1);
}

#[tokio::test]
async fn test_pool_discovery_loop() {
    let alerts = RecordingAlerts::new();
    let oracle = StubOracle::known(60_000);
    let source = ScriptedSource::new();
    source.push(
        "pools",
        Script::Deliver(vec![
            StreamEvent::PoolCreated(new_pool("0xpoolaaaaaaaaaaaaaaaa")),
            StreamEvent::PoolCreated(new_pool("0xpoolbbbbbbbbbbbbbbbb")),
        ]),
    );

    let subscription = Subscription::new(source.clone(), StreamFilter::NewPools, fast_retry(1));
    let err = run_pool_discovery(subscription, oracle, alerts.clone(), LiquidityBand::default()).await;

    assert!(err.is_terminal());
    assert_eq!(alerts.count_containing("New Pool"), 2);
}
