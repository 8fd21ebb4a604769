use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /api/state: last reconciliation time, the latest probe snapshots and
/// the configured maintainers.
pub async fn get_state(State(app): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = app.save_state.read().await.clone();
    Json(serde_json::json!({
        "last-sync": snapshot.last_sync,
        "move": snapshot.moves,
        "update": snapshot.updates,
        "maintainers": *app.maintainers,
    }))
}
