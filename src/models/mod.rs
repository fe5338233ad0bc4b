pub mod whale;

pub use whale::{NewWhale, TrackedWhale, WhaleKey, WhaleRecord, WhaleStatus};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// TradeEvent: one observed DEX buy or sell
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub actor_address: String,
    /// Pool / token contract the trade touched. Used for liquidity and balance lookups.
    pub pair_id: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub amount_usd: Decimal,
    pub token_amount: Decimal,
    pub side: Side,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl TradeEvent {
    pub fn pair(&self) -> String {
        format!("{}/{}", self.token0_symbol, self.token1_symbol)
    }

    /// True when this trade belongs to `pair`, in either symbol orientation.
    pub fn is_on_pair(&self, pair: &str) -> bool {
        let forward = self.pair();
        let reverse = format!("{}/{}", self.token1_symbol, self.token0_symbol);
        pair == forward || pair == reverse
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade: wallet={} pair={} side={} usd={} tokens={}",
            short_address(&self.actor_address),
            self.pair(),
            self.side,
            self.amount_usd,
            self.token_amount,
        )
    }
}

// ---------------------------------------------------------------------------
// PoolCreated: a new liquidity pool appeared on the DEX
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolCreated {
    pub pool_id: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
}

impl PoolCreated {
    pub fn pair(&self) -> String {
        format!("{}/{}", self.token0_symbol, self.token1_symbol)
    }
}

/// Item type of every event-source subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Trade(TradeEvent),
    PoolCreated(PoolCreated),
}

/// `0x1234...abcd` form for log lines and alerts. Counts characters, so
/// non-ASCII identifiers shorten safely.
pub fn short_address(address: &str) -> String {
    let chars = address.chars().count();
    if chars > 10 {
        let head: String = address.chars().take(6).collect();
        let tail: String = address.chars().skip(chars - 4).collect();
        format!("{head}...{tail}")
    } else {
        address.to_string()
    }
}
