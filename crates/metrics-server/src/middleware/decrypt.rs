use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;

use crate::state::AppState;

/// Applied only to `POST /update/`. When a private key is configured, the
/// raw body is treated as RSA-OAEP(SHA-256) ciphertext and replaced with
/// its plaintext before the inner handler runs. No key configured is a
/// pass-through — the source's equivalent middleware does the same.
pub async fn decrypt_layer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(path) = &state.cfg.private_key else {
        return next.run(req).await;
    };

    let key = match load_private_key(path) {
        Ok(k) => k,
        Err(e) => {
            return (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to load server private key: {e}"),
            )
                .into_response();
        }
    };

    let (parts, body) = req.into_parts();
    let ciphertext = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                format!("failed to read request body: {e}"),
            )
                .into_response();
        }
    };

    let plaintext = match key.decrypt(Oaep::new::<Sha256>(), &ciphertext) {
        Ok(p) => p,
        Err(e) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                format!("failed to decrypt request body: {e}"),
            )
                .into_response();
        }
    };

    let req = Request::from_parts(parts, Body::from(plaintext));
    next.run(req).await
}

fn load_private_key(path: &std::path::Path) -> Result<RsaPrivateKey, String> {
    let pem = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| e.to_string())
}
