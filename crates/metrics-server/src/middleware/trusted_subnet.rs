use axum::extract::{Request, State};
use axum::http::{HeaderName, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

static X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// No trusted subnet configured means every request is admitted. When one
/// is configured, `X-Real-IP` must be present, parse as an address, and
/// fall inside the configured CIDR.
pub async fn trusted_subnet_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.cfg.trusted_subnet.is_none() {
        return next.run(req).await;
    }

    let addr = req
        .headers()
        .get(&X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    match addr {
        Some(addr) if state.cfg.is_real_ip_trusted(addr) => next.run(req).await,
        _ => (
            StatusCode::BAD_REQUEST,
            "request is not from a trusted subnet",
        )
            .into_response(),
    }
}
