pub mod pipeline;
pub mod pool_discovery;
pub mod source;
pub mod subscription;

pub use source::{EventStream, StreamError, StreamFilter, TradeSource};
pub use subscription::{RetryPolicy, Subscription};
