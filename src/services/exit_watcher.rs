use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;

use crate::db::{StoreError, WhaleStore};
use crate::ingestion::{RetryPolicy, StreamError, StreamFilter, Subscription, TradeSource};
use crate::intelligence::{cooldown_remaining, is_exit_sale, ExitPolicy, LiquidityOracle};
use crate::models::{Side, StreamEvent, TradeEvent, TrackedWhale, WhaleStatus};
use crate::services::notifier::{format_exit_alert, AlertSink};

/// Everything an exit watch needs, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct ExitContext {
    pub store: Arc<dyn WhaleStore>,
    pub oracle: Arc<dyn LiquidityOracle>,
    pub alerts: Arc<dyn AlertSink>,
    pub source: Arc<dyn TradeSource>,
    pub policy: ExitPolicy,
    pub retry: RetryPolicy,
}

/// What a single sale meant for a tracked whale.
#[derive(Debug, Clone, PartialEq)]
pub enum SaleVerdict {
    /// Not a sell of this whale's pair by this whale.
    Unrelated,
    BelowThreshold,
    CoolingDown { remaining_secs: i64 },
    /// Position closed and the exit alert sent.
    Closed { sold: Decimal, remaining: Decimal },
    /// Someone else closed the position first; nothing sent.
    AlreadyClosed,
}

impl SaleVerdict {
    /// The watch for this whale is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleVerdict::Closed { .. } | SaleVerdict::AlreadyClosed)
    }
}

/// Apply the exit rule to one sale.
///
/// Order: side, seller, pair, size threshold, cooldown. On a match the store
/// is updated first; the wallet balance lookup and alert follow only when this
/// call performed the transition.
pub async fn evaluate_sale(
    whale: &TrackedWhale,
    sale: &TradeEvent,
    ctx: &ExitContext,
    now: DateTime<Utc>,
) -> Result<SaleVerdict, StoreError> {
    if sale.side != Side::Sell
        || !sale.actor_address.eq_ignore_ascii_case(&whale.address)
        || !sale.is_on_pair(&whale.pair)
    {
        return Ok(SaleVerdict::Unrelated);
    }

    if !is_exit_sale(whale.token_amount, sale.token_amount, ctx.policy.fraction) {
        tracing::debug!(
            wallet = %whale.address,
            pair = %whale.pair,
            sold = %sale.token_amount,
            entry = %whale.token_amount,
            "Sale below exit threshold"
        );
        return Ok(SaleVerdict::BelowThreshold);
    }

    let last = ctx.store.last_notified(&whale.address, &whale.pair).await?;
    if let Some(remaining) = cooldown_remaining(last, now, ctx.policy.cooldown) {
        tracing::info!(
            wallet = %whale.address,
            pair = %whale.pair,
            remaining_secs = remaining.num_seconds(),
            "Exit sale inside cooldown, alert suppressed"
        );
        counter!("exits_suppressed_total").increment(1);
        return Ok(SaleVerdict::CoolingDown {
            remaining_secs: remaining.num_seconds(),
        });
    }

    let changed = ctx
        .store
        .update_status(&whale.address, &whale.pair, WhaleStatus::Closed, now)
        .await?;
    if !changed {
        tracing::debug!(wallet = %whale.address, pair = %whale.pair, "Position already closed");
        return Ok(SaleVerdict::AlreadyClosed);
    }

    counter!("whale_exits_total").increment(1);
    let remaining = ctx.oracle.wallet_balance(&whale.address, &whale.pair_id).await;

    tracing::info!(
        wallet = %whale.address,
        pair = %whale.pair,
        sold = %sale.token_amount,
        sold_usd = %sale.amount_usd,
        remaining = %remaining,
        "Whale exit detected, position closed"
    );

    ctx.alerts
        .send(&format_exit_alert(whale, sale, remaining))
        .await;

    Ok(SaleVerdict::Closed {
        sold: sale.token_amount,
        remaining,
    })
}

/// Watch one whale's sells until its position closes.
///
/// Returns the terminal verdict on a match, or the subscription's error once
/// its retry budget is spent. A store failure drops that event only.
pub async fn watch_exit(whale: TrackedWhale, ctx: ExitContext) -> Result<SaleVerdict, StreamError> {
    let (_entry, current) = watch::channel(whale);
    follow_exit(current, ctx).await
}

/// Like [`watch_exit`], but each sale is judged against the latest entry
/// published on `current`. The seller address is fixed when the watch starts.
pub async fn follow_exit(
    current: watch::Receiver<TrackedWhale>,
    ctx: ExitContext,
) -> Result<SaleVerdict, StreamError> {
    let (address, pair) = {
        let whale = current.borrow();
        (whale.address.clone(), whale.pair.clone())
    };
    let filter = StreamFilter::SellsBy {
        address: address.clone(),
    };
    let mut subscription = Subscription::new(ctx.source.clone(), filter, ctx.retry);

    tracing::info!(wallet = %address, pair = %pair, "Exit watch started");

    loop {
        let StreamEvent::Trade(sale) = subscription.next_event().await? else {
            continue;
        };

        let whale = current.borrow().clone();
        match evaluate_sale(&whale, &sale, &ctx, Utc::now()).await {
            Ok(verdict) if verdict.is_terminal() => return Ok(verdict),
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
