pub mod api;
pub mod bitquery;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod ingestion;
pub mod intelligence;
pub mod services;

use std::sync::Arc;

use crate::db::SqliteWhaleStore;
use crate::services::EngineStatus;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteWhaleStore>,
    pub status: Arc<EngineStatus>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub api_token: Option<String>,
}
