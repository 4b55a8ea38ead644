//! HTTP middleware for API layer.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Method, Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;
use crate::domain::{AppError, VerifyQuery};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Constant-time comparison of two byte slices.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// True when serving the request submits a wallet-signed transaction:
/// every POST, and `GET /verify` naming a product address.
fn spends_wallet_funds(request: &Request<Body>) -> bool {
    if request.method() == Method::POST {
        return true;
    }
    if request.uri().path() != "/verify" {
        return false;
    }
    match Query::<VerifyQuery>::try_from_uri(request.uri()) {
        Ok(Query(query)) => query.address.is_some_and(|a| !a.trim().is_empty()),
        Err(_) => true,
    }
}

/// API key authentication middleware.
///
/// Requests that spend wallet funds require a valid `x-api-key` header;
/// reads pass through. Keys are compared through their SHA-256 digests so
/// the comparison length never depends on the input.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !spends_wallet_funds(&request) {
        return next.run(request).await;
    }

    let Some(provided) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        warn!(path = %request.uri().path(), "API auth failed: missing x-api-key header");
        return AppError::Authorization("missing x-api-key header".to_string()).into_response();
    };

    let expected_hash = Sha256::digest(state.api_auth_key.expose_secret().as_bytes());
    let provided_hash = Sha256::digest(provided.as_bytes());

    if !constant_time_eq(expected_hash.as_slice(), provided_hash.as_slice()) {
        warn!(path = %request.uri().path(), "API auth failed: invalid x-api-key");
        return AppError::Authorization("invalid x-api-key".to_string()).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_spends_wallet_funds() {
        assert!(spends_wallet_funds(&request(Method::POST, "/register")));
        assert!(spends_wallet_funds(&request(Method::GET, "/verify?address=abc")));
        assert!(!spends_wallet_funds(&request(Method::GET, "/verify")));
        assert!(!spends_wallet_funds(&request(Method::GET, "/verify?address=%20")));
        assert!(!spends_wallet_funds(&request(Method::GET, "/products?address=abc")));
        assert!(!spends_wallet_funds(&request(Method::GET, "/update")));
    }
}
