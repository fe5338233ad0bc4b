use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;

use super::types::decimal_from_value;
use crate::intelligence::{LiquidityOracle, LiquidityReading};

const LIQUIDITY_QUERY: &str = "query ($pair_contract: String!) { EVM(network: {network}) { \
     Pools(where: {Pair: {SmartContract: {is: $pair_contract}}}) { Liquidity { Value } } } }";

const BALANCE_QUERY: &str = "query ($address: String!, $token: String!) { EVM(network: {network}) { \
     Balances(where: {Address: {is: $address}, Currency: {SmartContract: {is: $token}}}) { Balance } } }";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Bitquery GraphQL point queries (pool liquidity, wallet balances).
#[derive(Debug, Clone)]
pub struct BitqueryClient {
    http: Client,
    base_url: String,
    token: String,
    network: String,
}

impl BitqueryClient {
    pub fn new(http: Client, base_url: String, token: String, network: String) -> Self {
        Self {
            http,
            base_url,
            token,
            network,
        }
    }

    async fn query(&self, template: &str, variables: Value) -> Result<Value, QueryError> {
        let query = template.replace("{network}", &self.network);
        let resp = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?;

        let body: Value = resp.json().await?;
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(QueryError::GraphQl(errors.to_string()));
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| QueryError::Unexpected("response has no data field".into()))
    }

    /// Current liquidity of a pool; `None` when the pool is unknown.
    pub async fn pool_liquidity(&self, pair_id: &str) -> Result<Option<Decimal>, QueryError> {
        let data = self
            .query(LIQUIDITY_QUERY, json!({ "pair_contract": pair_id }))
            .await?;
        first_value(&data, "/EVM/Pools", "/Liquidity/Value")
    }

    /// Token balance of a wallet; `None` when no balance row exists.
    pub async fn token_balance(
        &self,
        address: &str,
        token_id: &str,
    ) -> Result<Option<Decimal>, QueryError> {
        let data = self
            .query(BALANCE_QUERY, json!({ "address": address, "token": token_id }))
            .await?;
        first_value(&data, "/EVM/Balances", "/Balance")
    }
}

#[async_trait]
impl LiquidityOracle for BitqueryClient {
    async fn liquidity(&self, pair_id: &str) -> LiquidityReading {
        match self.pool_liquidity(pair_id).await {
            Ok(Some(value)) => LiquidityReading::Known(value),
            Ok(None) => {
                tracing::warn!(pair_id = %pair_id, "Liquidity check: pool not found");
                LiquidityReading::Unavailable
            }
            Err(e) => {
                tracing::warn!(error = %e, pair_id = %pair_id, "Liquidity check failed");
                LiquidityReading::Unavailable
            }
        }
    }

    async fn wallet_balance(&self, address: &str, token_id: &str) -> Decimal {
        match self.token_balance(address, token_id).await {
            Ok(balance) => balance.unwrap_or(Decimal::ZERO),
            Err(e) => {
                tracing::warn!(error = %e, wallet = %address, "Balance check failed");
                Decimal::ZERO
            }
        }
    }
}

/// Numeric field `field` of the first row under `rows`; `None` for an empty set.
fn first_value(data: &Value, rows: &str, field: &str) -> Result<Option<Decimal>, QueryError> {
    let rows = data
        .pointer(rows)
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::Unexpected(format!("missing {rows}")))?;

    let Some(first) = rows.first() else {
        return Ok(None);
    };

    first
        .pointer(field)
        .and_then(decimal_from_value)
        .map(Some)
        .ok_or_else(|| QueryError::Unexpected(format!("missing or non-numeric {field}")))
}
