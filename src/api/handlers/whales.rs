use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::{whale_repo, WhaleStore};
use crate::errors::AppError;
use crate::models::{WhaleRecord, WhaleStatus};
use crate::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

/// Every whale record, optionally filtered by `?status=tracked|closed`.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<WhaleRecord>>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<WhaleStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let records = state.store.export_all().await?;
    let records = match status {
        Some(s) => records.into_iter().filter(|r| r.status == s).collect(),
        None => records,
    };
    Ok(ApiResponse::ok(records))
}

/// All records for one wallet, across pairs.
pub async fn by_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<Vec<WhaleRecord>>>, AppError> {
    let records =
        whale_repo::get_whales_by_address(state.store.pool(), &address.to_ascii_lowercase())
            .await?;

    if records.is_empty() {
        return Err(AppError::NotFound(format!("no whale records for {address}")));
    }
    Ok(ApiResponse::ok(records))
}
