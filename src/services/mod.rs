pub mod backup;
pub mod exit_matcher;
pub mod exit_watcher;
pub mod notifier;
pub mod scheduler;
pub mod status;

pub use exit_matcher::{ExitMatcher, PerWhaleWatchers, SharedSellStream};
pub use exit_watcher::{evaluate_sale, follow_exit, watch_exit, ExitContext, SaleVerdict};
pub use notifier::{AlertSink, LogSink, Notifier};
pub use scheduler::{Scheduler, TickReport};
pub use status::EngineStatus;
