use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use crate::models::{short_address, PoolCreated, TradeEvent, TrackedWhale, WhaleRecord};

/// Fire-and-forget alert destination. Implementations log their own failures
/// and never retry.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, message: &str);
}

/// Telegram notification service. Failures are logged but never block the main flow.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }
}

#[async_trait]
impl AlertSink for Notifier {
    /// Send a Telegram message. Failures are logged as warnings.
    async fn send(&self, message: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    tracing::warn!(
                        status = %resp.status(),
                        "Telegram sendMessage returned non-2xx"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
            }
        }
    }
}

/// Writes alerts to the log. Used when Telegram is not configured.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, message: &str) {
        tracing::info!(alert = %message, "Alert (no Telegram destination configured)");
    }
}

/// Format a whale entry alert.
pub fn format_entry_alert(record: &WhaleRecord, liquidity: Decimal) -> String {
    format!(
        "*Whale Entry*\nWallet: `{}`\nPair: {}\nBought: ${} ({} tokens)\nPool liquidity: ${}",
        record.address,
        record.pair,
        record.amount_usd.round_dp(2),
        record.token_amount.normalize(),
        liquidity.round_dp(0),
    )
}

/// Format a whale exit alert, including what the wallet still holds.
pub fn format_exit_alert(whale: &TrackedWhale, sale: &TradeEvent, remaining: Decimal) -> String {
    format!(
        "*Whale Exit*\nWallet: `{}`\nPair: {}\nSold: ${} ({} of {} tokens)\nRemaining balance: {}",
        whale.address,
        whale.pair,
        sale.amount_usd.round_dp(2),
        sale.token_amount.normalize(),
        whale.token_amount.normalize(),
        remaining.round_dp(4).normalize(),
    )
}

/// Format a new pool alert.
pub fn format_new_pool_alert(pool: &PoolCreated, liquidity: Decimal) -> String {
    format!(
        "*New Pool*\nPair: {}\nPool: `{}`\nLiquidity: ${}",
        pool.pair(),
        short_address(&pool.pool_id),
        liquidity.round_dp(0),
    )
}
