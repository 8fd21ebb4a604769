use axum::extract::{Path, State};
use axum::Json;
use packy_core::{ActionType, FlagFilter};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/maintainers/{name}: packages the maintainer owns that are
/// flagged for a move or an update.
pub async fn get_maintainer(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let who = name.clone();
    let result = tokio::task::spawn_blocking(move || -> packy_core::Result<Option<serde_json::Value>> {
        let owned = store.count_owned(&name)?;
        if owned == 0 {
            return Ok(None);
        }
        let moves = store.list_by_maintainer(&name, ActionType::Move, FlagFilter::Flagged)?;
        let updates = store.list_by_maintainer(&name, ActionType::Update, FlagFilter::Flagged)?;
        Ok(Some(serde_json::json!({
            "maintainer": name,
            "packages_owned": owned,
            "moves": moves,
            "updates": updates,
        })))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    result
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("maintainer '{who}' owns no packages")))
}
