use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;

use super::source::StreamError;
use super::subscription::Subscription;
use crate::db::{StoreError, WhaleStore};
use crate::intelligence::{admit, check_amount, Admission, AdmissionPolicy, LiquidityOracle, Rejection};
use crate::models::{NewWhale, StreamEvent, TradeEvent, WhaleRecord};
use crate::services::notifier::{format_entry_alert, AlertSink};

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Recorded(WhaleRecord),
    Suppressed(Rejection),
}

/// Buy stream → admission → store → alert.
#[derive(Clone)]
pub struct EntryPipeline {
    store: Arc<dyn WhaleStore>,
    oracle: Arc<dyn LiquidityOracle>,
    alerts: Arc<dyn AlertSink>,
    policy: AdmissionPolicy,
}

impl EntryPipeline {
    pub fn new(
        store: Arc<dyn WhaleStore>,
        oracle: Arc<dyn LiquidityOracle>,
        alerts: Arc<dyn AlertSink>,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            store,
            oracle,
            alerts,
            policy,
        }
    }

    /// Process a single trade:
    /// 1. Re-validate side and entry floor
    /// 2. Look up pool liquidity
    /// 3. Look up the key's last alert for the cooldown
    /// 4. Insert the whale, then send the entry alert
    ///
    /// A store failure is returned to the caller; nothing is sent in that case.
    pub async fn process_trade(
        &self,
        trade: &TradeEvent,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome, StoreError> {
        counter!("trade_events_total").increment(1);

        // Step 1: cheap checks before any outbound call
        if let Err(rejection) = check_amount(trade, &self.policy) {
            return Ok(self.suppress(trade, rejection));
        }

        // Step 2: liquidity (fails closed)
        let liquidity = self.oracle.liquidity(&trade.pair_id).await;

        // Step 3: cooldown lookup; store keys hold lowercase addresses
        let pair = trade.pair();
        let wallet = trade.actor_address.to_ascii_lowercase();
        let last_notified = self.store.last_notified(&wallet, &pair).await?;

        if let Admission::Suppressed(rejection) =
            admit(trade, liquidity, last_notified, now, &self.policy)
        {
            return Ok(self.suppress(trade, rejection));
        }

        // Step 4: persist, then alert
        let record = self.store.insert(&NewWhale::from_trade(trade, now)).await?;
        counter!("whale_entries_total").increment(1);

        tracing::info!(
            wallet = %record.address,
            pair = %record.pair,
            amount_usd = %record.amount_usd,
            token_amount = %record.token_amount,
            liquidity = %liquidity.usd(),
            id = record.id,
            "Whale entry recorded"
        );

        self.alerts
            .send(&format_entry_alert(&record, liquidity.usd()))
            .await;

        Ok(EntryOutcome::Recorded(record))
    }

    fn suppress(&self, trade: &TradeEvent, rejection: Rejection) -> EntryOutcome {
        counter!("entries_suppressed_total", "reason" => rejection.label()).increment(1);
        match rejection {
            Rejection::LiquidityUnavailable => tracing::warn!(
                wallet = %trade.actor_address,
                pair_id = %trade.pair_id,
                "Entry skipped: liquidity could not be confirmed"
            ),
            _ => tracing::debug!(
                wallet = %trade.actor_address,
                pair = %trade.pair(),
                reason = %rejection,
                "Entry suppressed"
            ),
        }
        EntryOutcome::Suppressed(rejection)
    }

    /// Consume the buy subscription until its retry budget is exhausted.
    /// Events are handled one at a time, in delivery order.
    pub async fn run(&self, mut subscription: Subscription) -> StreamError {
        tracing::info!(
            filter = subscription.filter().label(),
            floor_usd = %self.policy.entry_floor_usd,
            band = %self.policy.band,
            "Entry pipeline started"
        );

        loop {
            let event = match subscription.next_event().await {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Entry stream abandoned");
                    return e;
                }
            };

            match event {
                StreamEvent::Trade(trade) => {
                    tracing::debug!(trade = %trade, "Trade received in pipeline");
                    if let Err(e) = self.process_trade(&trade, Utc::now()).await {
                        tracing::error!(
                            error = %e,
                            wallet = %trade.actor_address,
                            "Pipeline processing failed, event dropped"
                        );
                    }
                }
                StreamEvent::PoolCreated(pool) => {
                    tracing::debug!(pool = %pool.pool_id, "Unexpected pool event on buy stream");
                }
            }
        }
    }
}
