use futures_util::StreamExt;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::source::{EventStream, StreamError, StreamFilter, TradeSource};
use crate::models::StreamEvent;

/// Bounded reconnect policy: at most `max_attempts` consecutive failures,
/// `delay` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(60),
        }
    }
}

/// A reconnecting view over a `TradeSource` for one filter.
///
/// Open errors, mid-stream errors and end-of-stream all count as a failure.
/// The counter resets whenever a session opens successfully. Events missed
/// while disconnected are not replayed.
pub struct Subscription {
    source: Arc<dyn TradeSource>,
    filter: StreamFilter,
    policy: RetryPolicy,
    stream: Option<EventStream>,
    failures: u32,
}

impl Subscription {
    pub fn new(source: Arc<dyn TradeSource>, filter: StreamFilter, policy: RetryPolicy) -> Self {
        Self {
            source,
            filter,
            policy,
            stream: None,
            failures: 0,
        }
    }

    pub fn filter(&self) -> &StreamFilter {
        &self.filter
    }

    /// Next event from the feed, reconnecting as needed.
    ///
    /// Returns `StreamError::RetriesExhausted` once the failure budget is spent;
    /// the subscription is dead after that.
    pub async fn next_event(&mut self) -> Result<StreamEvent, StreamError> {
        loop {
            if self.failures >= self.policy.max_attempts {
                return Err(StreamError::RetriesExhausted {
                    attempts: self.failures,
                    last: "subscription already abandoned".into(),
                });
            }

            let Some(stream) = self.stream.as_mut() else {
                match self.source.open(&self.filter).await {
                    Ok(stream) => {
                        if self.failures > 0 {
                            tracing::info!(
                                filter = self.filter.label(),
                                after_failures = self.failures,
                                "Stream re-established"
                            );
                        }
                        self.failures = 0;
                        self.stream = Some(stream);
                    }
                    Err(e) => self.record_failure(e).await?,
                }
                continue;
            };

            match stream.next().await {
                Some(Ok(event)) => return Ok(event),
                Some(Err(e)) => {
                    self.stream = None;
                    self.record_failure(e).await?;
                }
                None => {
                    self.stream = None;
                    self.record_failure(StreamError::Closed).await?;
                }
            }
        }
    }

    async fn record_failure(&mut self, error: StreamError) -> Result<(), StreamError> {
        self.failures = self.failures.saturating_add(1);

        if self.failures >= self.policy.max_attempts {
            counter!("streams_abandoned_total", "filter" => self.filter.label()).increment(1);
            tracing::error!(
                filter = self.filter.label(),
                attempts = self.failures,
                error = %error,
                "Max retries reached, abandoning stream"
            );
            return Err(StreamError::RetriesExhausted {
                attempts: self.failures,
                last: error.to_string(),
            });
        }

        counter!("stream_reconnects_total", "filter" => self.filter.label()).increment(1);
        tracing::warn!(
            filter = self.filter.label(),
            attempt = self.failures,
            max_attempts = self.policy.max_attempts,
            delay_secs = self.policy.delay.as_secs(),
            error = %error,
            "Stream failed, retrying"
        );
        sleep(self.policy.delay).await;
        Ok(())
    }
}
