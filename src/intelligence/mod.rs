pub mod admission;
pub mod exit_rule;
pub mod liquidity;

pub use admission::{admit, check_amount, cooldown_remaining, Admission, AdmissionPolicy, LiquidityBand, Rejection};
pub use exit_rule::{is_exit_sale, ExitPolicy};
pub use liquidity::{LiquidityOracle, LiquidityReading};
