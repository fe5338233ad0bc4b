use async_trait::async_trait;
use futures_util::{stream, SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::types::{decode_frame, Frame, GqlFrame};
use crate::ingestion::{EventStream, StreamError, StreamFilter, TradeSource};
use crate::models::{Side, StreamEvent};

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
const SUBSCRIPTION_ID: &str = "1";

/// Bitquery streaming GraphQL over the `graphql-ws` sub-protocol.
#[derive(Debug, Clone)]
pub struct BitqueryStream {
    ws_url: String,
    token: String,
    network: String,
}

impl BitqueryStream {
    pub fn new(ws_url: String, token: String, network: String) -> Self {
        Self {
            ws_url,
            token,
            network,
        }
    }

    async fn connect(&self) -> Result<Ws, StreamError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| StreamError::Connect(format!("invalid token header: {e}")))?;
        let headers = request.headers_mut();
        headers.insert("Sec-WebSocket-Protocol", HeaderValue::from_static("graphql-ws"));
        headers.insert("Authorization", auth);

        let (ws, _response) = connect_async(request)
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        Ok(ws)
    }

    async fn handshake(&self, ws: &mut Ws) -> Result<(), StreamError> {
        send_frame(ws, &GqlFrame::connection_init(&self.token)).await?;

        let reply = timeout(HANDSHAKE_TIMEOUT, next_text(ws))
            .await
            .map_err(|_| StreamError::Handshake("timed out waiting for connection_ack".into()))??;

        match decode_frame(&reply, None) {
            Frame::Ack => Ok(()),
            Frame::Error(e) => Err(StreamError::Handshake(e)),
            other => Err(StreamError::Handshake(format!(
                "expected connection_ack, got {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl TradeSource for BitqueryStream {
    async fn open(&self, filter: &StreamFilter) -> Result<EventStream, StreamError> {
        tracing::info!(url = %self.ws_url, filter = filter.label(), "Connecting to Bitquery stream...");

        let mut ws = self.connect().await?;
        self.handshake(&mut ws).await?;

        let (query, variables) = build_subscription(filter, &self.network);
        send_frame(&mut ws, &GqlFrame::start(SUBSCRIPTION_ID, &query, variables)).await?;

        tracing::info!(filter = filter.label(), "Bitquery subscription started");

        let session = Session {
            ws,
            side: side_for(filter),
            pending: VecDeque::new(),
            done: false,
        };
        Ok(session.into_stream())
    }
}

struct Session {
    ws: Ws,
    side: Option<Side>,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

impl Session {
    fn into_stream(self) -> EventStream {
        stream::unfold(self, |mut session| async move {
            if session.done {
                return None;
            }
            match session.next_item().await {
                Ok(event) => Some((Ok(event), session)),
                Err(e) => {
                    session.done = true;
                    Some((Err(e), session))
                }
            }
        })
        .boxed()
    }

    async fn next_item(&mut self) -> Result<StreamEvent, StreamError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            let text = next_text(&mut self.ws).await?;
            match decode_frame(&text, self.side) {
                Frame::Events(events) => self.pending.extend(events),
                Frame::KeepAlive | Frame::Ack | Frame::Other => {}
                Frame::Error(e) => return Err(StreamError::Protocol(e)),
                Frame::Complete => return Err(StreamError::Closed),
            }
        }
    }
}

async fn send_frame(ws: &mut Ws, frame: &GqlFrame) -> Result<(), StreamError> {
    let text = serde_json::to_string(frame).map_err(|e| StreamError::Protocol(e.to_string()))?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| StreamError::Connect(e.to_string()))
}

/// Read until the next text frame, answering pings along the way.
async fn next_text(ws: &mut Ws) -> Result<String, StreamError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = ws.send(Message::Pong(data)).await {
                    return Err(StreamError::Connect(format!("failed to send pong: {e}")));
                }
            }
            Some(Ok(Message::Close(_))) => {
                tracing::warn!("Bitquery server sent close frame");
                return Err(StreamError::Closed);
            }
            Some(Ok(_)) => {} // Binary, Pong, Frame: ignore
            Some(Err(e)) => return Err(StreamError::Protocol(e.to_string())),
            None => return Err(StreamError::Closed),
        }
    }
}

fn side_for(filter: &StreamFilter) -> Option<Side> {
    match filter {
        StreamFilter::Buys { .. } => Some(Side::Buy),
        StreamFilter::SellsBy { .. } | StreamFilter::SellsByAny { .. } => Some(Side::Sell),
        StreamFilter::NewPools => None,
    }
}

const TRADE_LEG_FIELDS: &str =
    "Address AmountInUSD Amount Currency { SmartContract Symbol } BaseCurrency { Symbol }";

/// GraphQL subscription text and variables for a filter.
pub fn build_subscription(filter: &StreamFilter, network: &str) -> (String, Value) {
    match filter {
        StreamFilter::Buys { min_usd } => (
            format!(
                "subscription ($min_usd: String!) {{ EVM(network: {network}) {{ \
                 DEXTrades(where: {{Trade: {{Buy: {{AmountInUSD: {{ge: $min_usd}}}}}}}}) {{ \
                 Transaction {{ Hash }} Trade {{ Buy {{ {TRADE_LEG_FIELDS} }} }} }} }} }}"
            ),
            json!({ "min_usd": min_usd.to_string() }),
        ),
        StreamFilter::SellsBy { address } => (
            format!(
                "subscription ($address: String!) {{ EVM(network: {network}) {{ \
                 DEXTrades(where: {{Trade: {{Sell: {{Address: {{is: $address}}}}}}}}) {{ \
                 Transaction {{ Hash }} Trade {{ Sell {{ {TRADE_LEG_FIELDS} }} }} }} }} }}"
            ),
            json!({ "address": address }),
        ),
        StreamFilter::SellsByAny { addresses } => (
            format!(
                "subscription ($addresses: [String!]) {{ EVM(network: {network}) {{ \
                 DEXTrades(where: {{Trade: {{Sell: {{Address: {{in: $addresses}}}}}}}}) {{ \
                 Transaction {{ Hash }} Trade {{ Sell {{ {TRADE_LEG_FIELDS} }} }} }} }} }}"
            ),
            json!({ "addresses": addresses }),
        ),
        StreamFilter::NewPools => (
            format!(
                "subscription {{ EVM(network: {network}) {{ DEXPoolCreated {{ \
                 Pool {{ SmartContract Token0 {{ Symbol }} Token1 {{ Symbol }} }} }} }} }}"
            ),
            json!({}),
        ),
    }
}
