use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use packy_core::{ActionType, FlagFilter, PackageStore};
use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Snapshot sizes reported under the `any` maintainer label.
struct Totals {
    moves: usize,
    updates: usize,
}

/// GET /metrics: Prometheus gauges, recomputed from the store on each scrape.
pub async fn metrics(State(app): State<AppState>) -> Result<Response, AppError> {
    let totals = {
        let snapshot = app.save_state.read().await;
        Totals {
            moves: snapshot.candidates(ActionType::Move).len(),
            updates: snapshot.candidates(ActionType::Update).len(),
        }
    };
    let store = app.store.clone();
    let maintainers = app.maintainers.clone();
    let prefix = app.metric_prefix.clone();

    let body = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        render(&store, &maintainers, &prefix, &totals)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}

fn render(
    store: &PackageStore,
    maintainers: &[String],
    prefix: &str,
    totals: &Totals,
) -> anyhow::Result<String> {
    let registry = Registry::new();
    let pending = IntGaugeVec::new(
        Opts::new(
            format!("{prefix}pending_packages"),
            "Number of packages that have pending moves and updates.",
        ),
        &["maintainer", "action"],
    )?;
    let watched = IntGaugeVec::new(
        Opts::new(
            format!("{prefix}watched_packages"),
            "Number of packages being monitored for updates.",
        ),
        &["maintainer"],
    )?;
    registry.register(Box::new(pending.clone()))?;
    registry.register(Box::new(watched.clone()))?;

    for name in maintainers {
        for &action in ActionType::all() {
            let count = store.count_by_maintainer(name, action, FlagFilter::Flagged)?;
            pending
                .with_label_values(&[name.as_str(), action.as_str()])
                .set(count as i64);
        }
        watched
            .with_label_values(&[name.as_str()])
            .set(store.count_owned(name)? as i64);
    }
    pending
        .with_label_values(&["any", ActionType::Move.as_str()])
        .set(totals.moves as i64);
    pending
        .with_label_values(&["any", ActionType::Update.as_str()])
        .set(totals.updates as i64);

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
