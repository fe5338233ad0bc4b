use metrics::counter;
use std::sync::Arc;

use super::source::StreamError;
use super::subscription::Subscription;
use crate::intelligence::{LiquidityBand, LiquidityOracle, LiquidityReading};
use crate::models::{PoolCreated, StreamEvent};
use crate::services::notifier::{format_new_pool_alert, AlertSink};

/// Alert on a new pool if its liquidity lands inside the band. Returns whether
/// an alert was sent.
pub async fn handle_new_pool(
    pool: &PoolCreated,
    oracle: &dyn LiquidityOracle,
    alerts: &dyn AlertSink,
    band: &LiquidityBand,
) -> bool {
    let liquidity = match oracle.liquidity(&pool.pool_id).await {
        LiquidityReading::Known(v) => v,
        LiquidityReading::Unavailable => {
            tracing::debug!(pool = %pool.pool_id, "New pool liquidity unavailable, skipped");
            return false;
        }
    };

    if !band.contains(liquidity) {
        tracing::debug!(
            pool = %pool.pool_id,
            pair = %pool.pair(),
            liquidity = %liquidity,
            "New pool outside liquidity band"
        );
        return false;
    }

    tracing::info!(
        pool = %pool.pool_id,
        pair = %pool.pair(),
        liquidity = %liquidity,
        "New pool in liquidity band"
    );
    counter!("new_pool_alerts_total").increment(1);
    alerts.send(&format_new_pool_alert(pool, liquidity)).await;
    true
}

/// Consume the new-pool subscription until its retry budget is exhausted.
pub async fn run_pool_discovery(
    mut subscription: Subscription,
    oracle: Arc<dyn LiquidityOracle>,
    alerts: Arc<dyn AlertSink>,
    band: LiquidityBand,
) -> StreamError {
    tracing::info!(band = %band, "Pool discovery started");

    loop {
        match subscription.next_event().await {
            Ok(StreamEvent::PoolCreated(pool)) => {
                handle_new_pool(&pool, oracle.as_ref(), alerts.as_ref(), &band).await;
            }
            Ok(StreamEvent::Trade(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "Pool discovery stream abandoned");
                return e;
            }
        }
    }
}
