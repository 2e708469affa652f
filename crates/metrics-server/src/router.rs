use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{decrypt_layer, trusted_subnet_layer};
use crate::state::AppState;

/// Builds the full HTTP surface (SPEC_FULL.md §6), the single-metric
/// update route wrapped with the RSA-decrypt middleware, every route
/// wrapped with trusted-subnet admission, and the whole router wrapped
/// with gzip (both directions), tracing, and panic recovery.
pub fn build(state: AppState) -> Router {
    let update_json_route = Router::new()
        .route("/update/", post(handlers::update_by_json))
        .layer(middleware::from_fn_with_state(state.clone(), decrypt_layer))
        .with_state(state.clone());

    let rest = Router::new()
        .route(
            "/update/{type}/{name}/{value}",
            post(handlers::update_by_url),
        )
        .route("/updates/", post(handlers::update_list))
        .route("/value/{type}/{name}", get(handlers::value_by_url))
        .route("/value/", post(handlers::value_by_json))
        .route("/ping", get(handlers::ping))
        .route("/", get(handlers::index))
        .with_state(state.clone());

    Router::new()
        .merge(update_json_route)
        .merge(rest)
        .layer(middleware::from_fn_with_state(
            state,
            trusted_subnet_layer,
        ))
        .layer(CompressionLayer::new().gzip(true))
        .layer(RequestDecompressionLayer::new().gzip(true))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}
