use std::path::Path;
use thiserror::Error;

use crate::db::{StoreError, WhaleStore};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("store read failed: {0}")]
    Store(#[from] StoreError),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Dump every whale record to `path` as a pretty-printed JSON array.
///
/// Written to a sibling temp file first and renamed into place, so a reader
/// never sees a half-written file. Returns the number of records written.
pub async fn export_backup(store: &dyn WhaleStore, path: &Path) -> Result<usize, BackupError> {
    let records = store.export_all().await?;
    let body = serde_json::to_vec_pretty(&records)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    tokio::fs::write(&tmp, &body).await?;
    tokio::fs::rename(&tmp, path).await?;

    Ok(records.len())
}
