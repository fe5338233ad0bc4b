use chrono::Duration;
use rust_decimal::Decimal;

/// Exit detection thresholds.
#[derive(Debug, Clone)]
pub struct ExitPolicy {
    /// Fraction of the entry token amount a single sale must reach (default 0.1).
    pub fraction: Decimal,
    /// Alert spacing for the (address, pair) key, shared with entry admission.
    pub cooldown: Duration,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self {
            fraction: Decimal::new(1, 1), // 0.1
            cooldown: Duration::hours(1),
        }
    }
}

/// Per-event rule: one sale of at least `fraction × entry_amount` is an exit.
/// Sales are never accumulated.
pub fn is_exit_sale(entry_amount: Decimal, sold: Decimal, fraction: Decimal) -> bool {
    sold >= entry_amount * fraction
}
