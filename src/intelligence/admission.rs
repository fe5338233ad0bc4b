use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use super::liquidity::LiquidityReading;
use crate::models::{Side, TradeEvent};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Inclusive liquidity range. `max = None` means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiquidityBand {
    pub min: Decimal,
    pub max: Option<Decimal>,
}

impl LiquidityBand {
    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }
}

impl Default for LiquidityBand {
    fn default() -> Self {
        Self {
            min: Decimal::from(50_000),
            max: Some(Decimal::from(200_000)),
        }
    }
}

impl fmt::Display for LiquidityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}, {}]", self.min, max),
            None => write!(f, "[{}, inf)", self.min),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdmissionPolicy {
    /// Minimum buy notional in USD (inclusive).
    pub entry_floor_usd: Decimal,
    pub band: LiquidityBand,
    /// Minimum spacing between two alerts for the same (address, pair).
    #[serde(skip)]
    pub cooldown: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            entry_floor_usd: Decimal::from(100_000),
            band: LiquidityBand::default(),
            cooldown: Duration::hours(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    WrongSide,
    BelowFloor { amount_usd: Decimal },
    LiquidityUnavailable,
    LiquidityOutOfBand { liquidity: Decimal },
    CoolingDown { remaining_secs: i64 },
}

impl Rejection {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::WrongSide => "wrong_side",
            Rejection::BelowFloor { .. } => "below_floor",
            Rejection::LiquidityUnavailable => "liquidity_unavailable",
            Rejection::LiquidityOutOfBand { .. } => "liquidity_out_of_band",
            Rejection::CoolingDown { .. } => "cooling_down",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::WrongSide => write!(f, "not a buy"),
            Rejection::BelowFloor { amount_usd } => write!(f, "amount ${amount_usd} below entry floor"),
            Rejection::LiquidityUnavailable => write!(f, "liquidity lookup failed"),
            Rejection::LiquidityOutOfBand { liquidity } => {
                write!(f, "liquidity ${liquidity} outside band")
            }
            Rejection::CoolingDown { remaining_secs } => {
                write!(f, "cooldown active ({remaining_secs}s remaining)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Entry,
    Suppressed(Rejection),
}

/// Decide whether a buy qualifies as a whale entry.
///
/// Pure function, no I/O. Rules, in order:
/// 1. Buy side with `amount_usd >= entry_floor_usd`
/// 2. Known liquidity inside the band (both bounds inclusive)
/// 3. No alert for the same key within the cooldown window
pub fn admit(
    trade: &TradeEvent,
    liquidity: LiquidityReading,
    last_notified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &AdmissionPolicy,
) -> Admission {
    if let Err(rejection) = check_amount(trade, policy) {
        return Admission::Suppressed(rejection);
    }

    let value = match liquidity {
        LiquidityReading::Known(v) => v,
        LiquidityReading::Unavailable => {
            return Admission::Suppressed(Rejection::LiquidityUnavailable)
        }
    };
    if !policy.band.contains(value) {
        return Admission::Suppressed(Rejection::LiquidityOutOfBand { liquidity: value });
    }

    if let Some(remaining) = cooldown_remaining(last_notified, now, policy.cooldown) {
        return Admission::Suppressed(Rejection::CoolingDown {
            remaining_secs: remaining.num_seconds(),
        });
    }

    Admission::Entry
}

/// Rule 1 on its own: buy side at or above the entry floor. Lets callers skip
/// the liquidity lookup for trades that can never qualify.
pub fn check_amount(trade: &TradeEvent, policy: &AdmissionPolicy) -> Result<(), Rejection> {
    if trade.side != Side::Buy {
        return Err(Rejection::WrongSide);
    }
    if trade.amount_usd < policy.entry_floor_usd {
        return Err(Rejection::BelowFloor {
            amount_usd: trade.amount_usd,
        });
    }
    Ok(())
}

/// Time left on the cooldown for a key last alerted at `last_notified`, or
/// `None` when a new alert is allowed.
pub fn cooldown_remaining(
    last_notified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Option<Duration> {
    let last = last_notified?;
    let elapsed = now - last;
    if elapsed < cooldown {
        Some(cooldown - elapsed)
    } else {
        None
    }
}
