use axum::extract::{Path, Query, State};
use axum::Json;
use packy_core::{PackageRecord, PackyError};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub starts_with: Option<String>,
}

/// GET /api/packages?starts_with=: package names, optionally by prefix.
pub async fn list_packages(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let store = app.store.clone();
    let names = tokio::task::spawn_blocking(move || {
        store.list_packages(params.starts_with.as_deref())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(names))
}

/// GET /api/packages/{name}
pub async fn get_package(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PackageRecord>, AppError> {
    let store = app.store.clone();
    let record = tokio::task::spawn_blocking(move || -> packy_core::Result<PackageRecord> {
        store.get(&name)?.ok_or(PackyError::PackageNotFound(name))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(record))
}
