use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ingestion::RetryPolicy;
use crate::intelligence::{AdmissionPolicy, ExitPolicy, LiquidityBand};

const DEFAULT_WS_URL: &str = "wss://streaming.bitquery.io/graphql";
const DEFAULT_HTTP_URL: &str = "https://graphql.bitquery.io";

/// Which exit detection strategy the scheduler drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMatcherKind {
    PerWhale,
    Shared,
}

impl FromStr for ExitMatcherKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_whale" | "per-whale" => Ok(ExitMatcherKind::PerWhale),
            "shared" => Ok(ExitMatcherKind::Shared),
            other => anyhow::bail!("EXIT_MATCHER must be per_whale or shared, got {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub api_token: Option<String>,

    // Bitquery
    pub bitquery_token: String,
    pub bitquery_ws_url: String,
    pub bitquery_http_url: String,
    pub network: String,

    // Telegram (optional; alerts go to the log when unset)
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Admission / exit thresholds
    pub entry_floor_usd: Decimal,
    pub liquidity_band: LiquidityBand,
    pub cooldown_secs: i64,
    pub exit_fraction: Decimal,

    // Reconnect
    pub reconnect_max_attempts: u32,
    pub reconnect_delay_secs: u64,

    // Scheduler
    pub scheduler_interval_secs: u64,
    pub backup_path: Option<PathBuf>,
    pub pool_discovery_enabled: bool,
    pub exit_matcher: ExitMatcherKind,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let liquidity_min: Decimal = parse_or("LIQUIDITY_MIN", Decimal::from(50_000))?;
        let liquidity_max = parse_band_max(
            env::var("LIQUIDITY_MAX").ok().as_deref(),
            Some(Decimal::from(200_000)),
        )?;
        if let Some(max) = liquidity_max {
            if max < liquidity_min {
                anyhow::bail!("LIQUIDITY_MAX ({max}) is below LIQUIDITY_MIN ({liquidity_min})");
            }
        }

        let exit_fraction: Decimal = parse_or("EXIT_FRACTION", Decimal::new(1, 1))?;
        if exit_fraction <= Decimal::ZERO {
            anyhow::bail!("EXIT_FRACTION must be positive");
        }

        let reconnect_max_attempts: u32 = parse_or("RECONNECT_MAX_ATTEMPTS", 5)?;
        if reconnect_max_attempts == 0 {
            anyhow::bail!("RECONNECT_MAX_ATTEMPTS must be at least 1");
        }

        let scheduler_interval_secs: u64 = parse_or("SCHEDULER_INTERVAL_SECS", 300)?;
        if scheduler_interval_secs == 0 {
            anyhow::bail!("SCHEDULER_INTERVAL_SECS must be at least 1");
        }

        let backup_path = match env::var("BACKUP_PATH") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(PathBuf::from(v)),
            Err(_) => Some(PathBuf::from("whales_backup.json")),
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://whales.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("PORT", 8080)?,
            api_token: non_empty("API_TOKEN"),

            bitquery_token: env::var("BITQUERY_TOKEN")
                .map_err(|_| anyhow::anyhow!("BITQUERY_TOKEN must be set"))?,
            bitquery_ws_url: env::var("BITQUERY_WS_URL")
                .unwrap_or_else(|_| DEFAULT_WS_URL.into()),
            bitquery_http_url: env::var("BITQUERY_HTTP_URL")
                .unwrap_or_else(|_| DEFAULT_HTTP_URL.into()),
            network: env::var("BITQUERY_NETWORK").unwrap_or_else(|_| "bsc".into()),

            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty("TELEGRAM_CHAT_ID"),

            entry_floor_usd: parse_or("ENTRY_FLOOR_USD", Decimal::from(100_000))?,
            liquidity_band: LiquidityBand {
                min: liquidity_min,
                max: liquidity_max,
            },
            cooldown_secs: parse_or("COOLDOWN_SECS", 3600)?,
            exit_fraction,

            reconnect_max_attempts,
            reconnect_delay_secs: parse_or("RECONNECT_DELAY_SECS", 60)?,

            scheduler_interval_secs,
            backup_path,
            pool_discovery_enabled: parse_or("POOL_DISCOVERY_ENABLED", true)?,
            exit_matcher: parse_or("EXIT_MATCHER", ExitMatcherKind::PerWhale)?,
        })
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            entry_floor_usd: self.entry_floor_usd,
            band: self.liquidity_band,
            cooldown: ChronoDuration::seconds(self.cooldown_secs),
        }
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        ExitPolicy {
            fraction: self.exit_fraction,
            cooldown: ChronoDuration::seconds(self.cooldown_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.reconnect_max_attempts,
            delay: Duration::from_secs(self.reconnect_delay_secs),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        _ => Ok(default),
    }
}

/// Upper band bound: unset keeps `default`, `none` (or `inf`) removes the bound.
fn parse_band_max(raw: Option<&str>, default: Option<Decimal>) -> anyhow::Result<Option<Decimal>> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "none" | "inf" | "unbounded" => Ok(None),
        _ => raw
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid LIQUIDITY_MAX={raw:?}: {e}")),
    }
}
