//! Axum router wiring.
//!
//! Account routes live under `server.api_prefix`; ops routes live at the root.

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{api, app_state::AppState, middleware, ops};

pub fn build_router(state: AppState) -> Router {
    let cfg = state.cfg().clone();

    let mut app = if cfg.server.api_prefix.is_empty() {
        Router::new().merge(api::accounts::routes())
    } else {
        Router::new().nest(&cfg.server.api_prefix, api::accounts::routes())
    };

    if state.metrics().is_some() {
        app = app.route(&cfg.metrics.path, get(ops::metrics));
    }

    app.route(&cfg.metrics.health_path, get(ops::health))
        .route_layer(from_fn_with_state(state.clone(), middleware::track_request))
        .fallback(ops::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::error_boundary))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
