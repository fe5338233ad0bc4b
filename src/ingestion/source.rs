use async_trait::async_trait;
use futures_util::stream::BoxStream;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::StreamEvent;

/// What a subscription should deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFilter {
    /// Buy-side trades at or above a USD floor.
    Buys { min_usd: Decimal },
    /// Sell-side trades by one address.
    SellsBy { address: String },
    /// Sell-side trades by any of a set of addresses.
    SellsByAny { addresses: Vec<String> },
    /// Newly created pools.
    NewPools,
}

impl StreamFilter {
    pub fn label(&self) -> &'static str {
        match self {
            StreamFilter::Buys { .. } => "buys",
            StreamFilter::SellsBy { .. } => "sells_by",
            StreamFilter::SellsByAny { .. } => "sells_by_any",
            StreamFilter::NewPools => "new_pools",
        }
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("stream closed by server")]
    Closed,

    #[error("gave up after {attempts} consecutive failures (last: {last})")]
    RetriesExhausted { attempts: u32, last: String },
}

impl StreamError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamError::RetriesExhausted { .. })
    }
}

/// One logical session: lazy, infinite until it fails, not restartable.
pub type EventStream = BoxStream<'static, Result<StreamEvent, StreamError>>;

/// A subscribe primitive over the external event feed.
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Establish a new session for `filter`. Handshake failures surface here.
    async fn open(&self, filter: &StreamFilter) -> Result<EventStream, StreamError>;
}
