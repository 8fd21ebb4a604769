pub mod error;
pub mod routes;
pub mod state;

use std::future::Future;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(routes::health::healthcheck))
        .route("/robots.txt", get(routes::health::robots))
        .route("/metrics", get(routes::metrics::metrics))
        // State
        .route("/api/state", get(routes::state::get_state))
        // Maintainers
        .route(
            "/api/maintainers/{name}",
            get(routes::maintainers::get_maintainer),
        )
        // Packages
        .route("/api/packages", get(routes::packages::list_packages))
        .route("/api/packages/{name}", get(routes::packages::get_package))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve on a pre-bound listener until `shutdown` resolves.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// before starting (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on<F>(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("packy query server listening on http://0.0.0.0:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
