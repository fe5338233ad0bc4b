use async_trait::async_trait;
use rust_decimal::Decimal;

/// Result of a point-in-time pool liquidity lookup.
///
/// `Unavailable` covers transport errors, malformed responses and empty result
/// sets. It is never admitted, but it is reported separately from a genuine
/// `Known(0)` so the two show up distinctly in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityReading {
    Known(Decimal),
    Unavailable,
}

impl LiquidityReading {
    /// USD value with the fail-closed default applied.
    pub fn usd(&self) -> Decimal {
        match self {
            LiquidityReading::Known(v) => *v,
            LiquidityReading::Unavailable => Decimal::ZERO,
        }
    }
}

/// Point queries against the market data provider. Implementations never
/// propagate errors: lookups fail closed.
#[async_trait]
pub trait LiquidityOracle: Send + Sync {
    /// Current liquidity of the pool identified by `pair_id`. Never cached.
    async fn liquidity(&self, pair_id: &str) -> LiquidityReading;

    /// Current balance of `token_id` held by `address`; zero on any failure.
    async fn wallet_balance(&self, address: &str, token_id: &str) -> Decimal;
}
