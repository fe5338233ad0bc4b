use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::models::{PoolCreated, Side, StreamEvent, TradeEvent};

// ---------------------------------------------------------------------------
// graphql-ws protocol frames
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GqlFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl GqlFrame {
    pub fn connection_init(token: &str) -> Self {
        Self {
            kind: "connection_init".into(),
            id: None,
            payload: Some(serde_json::json!({
                "headers": { "Authorization": format!("Bearer {token}") }
            })),
        }
    }

    pub fn start(id: &str, query: &str, variables: Value) -> Self {
        Self {
            kind: "start".into(),
            id: Some(id.into()),
            payload: Some(serde_json::json!({ "query": query, "variables": variables })),
        }
    }
}

/// What one inbound text frame means to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Ack,
    KeepAlive,
    Events(Vec<StreamEvent>),
    Error(String),
    Complete,
    Other,
}

// ---------------------------------------------------------------------------
// EVM payloads (DEXTrades / DEXPoolCreated)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DataPayload {
    #[serde(rename = "EVM", default)]
    pub evm: EvmData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvmData {
    #[serde(rename = "DEXTrades", default)]
    pub dex_trades: Vec<DexTradeRow>,
    #[serde(rename = "DEXPoolCreated", default)]
    pub pools_created: Vec<PoolCreatedRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DexTradeRow {
    #[serde(default)]
    pub transaction: Option<TransactionRef>,
    pub trade: TradeBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionRef {
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TradeBody {
    #[serde(default)]
    pub buy: Option<TradeLeg>,
    #[serde(default)]
    pub sell: Option<TradeLeg>,
    #[serde(default)]
    pub amount: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TradeLeg {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "AmountInUSD", default)]
    pub amount_in_usd: Option<Value>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub currency: Option<CurrencyRef>,
    #[serde(default)]
    pub base_currency: Option<CurrencyRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurrencyRef {
    #[serde(default)]
    pub smart_contract: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoolCreatedRow {
    pub pool: PoolRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoolRef {
    #[serde(default)]
    pub smart_contract: Option<String>,
    #[serde(default)]
    pub token0: Option<CurrencyRef>,
    #[serde(default)]
    pub token1: Option<CurrencyRef>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one text frame. `side` selects which trade leg the session cares
/// about; `None` for pool sessions.
pub fn decode_frame(text: &str, side: Option<Side>) -> Frame {
    let frame: GqlFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, raw = %text, "Unparseable frame");
            return Frame::Other;
        }
    };

    match frame.kind.as_str() {
        "connection_ack" => Frame::Ack,
        "ka" => Frame::KeepAlive,
        "complete" => Frame::Complete,
        "error" | "connection_error" => Frame::Error(
            frame
                .payload
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unspecified error".into()),
        ),
        "data" => {
            let Some(payload) = frame.payload else {
                return Frame::Other;
            };
            if let Some(errors) = payload.get("errors").filter(|e| !e.is_null()) {
                return Frame::Error(errors.to_string());
            }
            let Some(data) = payload.get("data").filter(|d| !d.is_null()) else {
                return Frame::Other;
            };
            match serde_json::from_value::<DataPayload>(data.clone()) {
                Ok(parsed) => Frame::Events(convert_payload(parsed, side)),
                Err(e) => {
                    tracing::debug!(error = %e, "Data frame did not match EVM schema");
                    Frame::Events(Vec::new())
                }
            }
        }
        _ => Frame::Other,
    }
}

fn convert_payload(payload: DataPayload, side: Option<Side>) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(side) = side {
        for row in &payload.evm.dex_trades {
            match convert_trade(row, side) {
                Some(trade) => events.push(StreamEvent::Trade(trade)),
                None => tracing::debug!("DEX trade row missing required fields, skipped"),
            }
        }
    }

    for row in &payload.evm.pools_created {
        match convert_pool(row) {
            Some(pool) => events.push(StreamEvent::PoolCreated(pool)),
            None => tracing::debug!("Pool row missing required fields, skipped"),
        }
    }

    events
}

pub fn convert_trade(row: &DexTradeRow, side: Side) -> Option<TradeEvent> {
    let leg = match side {
        Side::Buy => row.trade.buy.as_ref()?,
        Side::Sell => row.trade.sell.as_ref()?,
    };

    let actor_address = leg.address.as_deref()?.to_ascii_lowercase();
    let currency = leg.currency.as_ref()?;
    let pair_id = currency.smart_contract.clone()?;
    let token0_symbol = currency.symbol.clone()?;
    let token1_symbol = leg
        .base_currency
        .as_ref()
        .and_then(|c| c.symbol.clone())?;

    let amount_usd = leg
        .amount_in_usd
        .as_ref()
        .and_then(decimal_from_value)
        .unwrap_or(Decimal::ZERO);

    // Older query shapes put Amount on the trade, newer ones on the leg.
    let token_amount = row
        .trade
        .amount
        .as_ref()
        .or(leg.amount.as_ref())
        .and_then(decimal_from_value)
        .unwrap_or(Decimal::ZERO);

    Some(TradeEvent {
        actor_address,
        pair_id,
        token0_symbol,
        token1_symbol,
        amount_usd,
        token_amount,
        side,
        tx_hash: row.transaction.as_ref().and_then(|t| t.hash.clone()),
    })
}

pub fn convert_pool(row: &PoolCreatedRow) -> Option<PoolCreated> {
    Some(PoolCreated {
        pool_id: row.pool.smart_contract.clone()?,
        token0_symbol: row.pool.token0.as_ref()?.symbol.clone()?,
        token1_symbol: row.pool.token1.as_ref()?.symbol.clone()?,
    })
}

/// Parse a JSON number or numeric string into a `Decimal`.
pub fn decimal_from_value(v: &Value) -> Option<Decimal> {
    let text = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
