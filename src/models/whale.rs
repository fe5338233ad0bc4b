use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TradeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhaleStatus {
    Tracked,
    Closed,
}

impl WhaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhaleStatus::Tracked => "tracked",
            WhaleStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for WhaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WhaleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tracked" => Ok(WhaleStatus::Tracked),
            "closed" => Ok(WhaleStatus::Closed),
            other => Err(format!("unknown whale status: {other}")),
        }
    }
}

/// A whale position as persisted in the `whales` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleRecord {
    pub id: i64,
    pub address: String,
    pub pair: String,
    pub pair_id: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub amount_usd: Decimal,
    pub token_amount: Decimal,
    pub entry_time: DateTime<Utc>,
    pub last_notified: DateTime<Utc>,
    pub status: WhaleStatus,
}

/// Insert payload for a freshly admitted entry.
#[derive(Debug, Clone)]
pub struct NewWhale {
    pub address: String,
    pub pair: String,
    pub pair_id: String,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub amount_usd: Decimal,
    pub token_amount: Decimal,
    pub entry_time: DateTime<Utc>,
}

impl NewWhale {
    pub fn from_trade(trade: &TradeEvent, entry_time: DateTime<Utc>) -> Self {
        Self {
            address: trade.actor_address.to_ascii_lowercase(),
            pair: trade.pair(),
            pair_id: trade.pair_id.clone(),
            token0_symbol: trade.token0_symbol.clone(),
            token1_symbol: trade.token1_symbol.clone(),
            amount_usd: trade.amount_usd,
            token_amount: trade.token_amount,
            entry_time,
        }
    }
}

/// Projection returned by the tracked scan; everything an exit watch needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedWhale {
    pub address: String,
    pub pair: String,
    pub pair_id: String,
    pub token_amount: Decimal,
    pub entry_time: DateTime<Utc>,
}

impl TrackedWhale {
    pub fn key(&self) -> WhaleKey {
        WhaleKey {
            address: self.address.clone(),
            pair: self.pair.clone(),
        }
    }
}

impl From<&WhaleRecord> for TrackedWhale {
    fn from(r: &WhaleRecord) -> Self {
        Self {
            address: r.address.clone(),
            pair: r.pair.clone(),
            pair_id: r.pair_id.clone(),
            token_amount: r.token_amount,
            entry_time: r.entry_time,
        }
    }
}

/// `(address, pair)` identity of a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhaleKey {
    pub address: String,
    pub pair: String,
}

impl fmt::Display for WhaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.address, self.pair)
    }
}
