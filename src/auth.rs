//! Access-Token Validator (spec.md §4.2).
//!
//! A stateless predicate over the incoming HTTP request. Grounded on the
//! teacher's custom `Header` implementation for `ProtocolVersion`
//! (`oprf-service/src/api/oprf.rs`), which also needs to read a header by
//! hand rather than rely on extractor-rejection semantics; here because a
//! missing `Authorization` header must fall through to the query parameter,
//! which a hard-failing extractor can't express.

use axum::http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

const BEARER_PREFIX: &str = "Bearer ";

/// Validates a request against the configured access token.
///
/// - An empty configured token means "allow all".
/// - Otherwise the candidate token comes from `Authorization: Bearer <tok>`
///   if that header is present (any other `Authorization` form yields no
///   candidate and fails), or from the `access_token` query parameter only
///   when `Authorization` is absent entirely.
pub fn validate(configured: &SecretString, headers: &HeaderMap, query_token: Option<&str>) -> bool {
    let configured = configured.expose_secret();
    if configured.is_empty() {
        return true;
    }

    let candidate = match headers.get(axum::http::header::AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix(BEARER_PREFIX)),
        None => query_token,
    };

    match candidate {
        Some(candidate) => constant_time_eq(candidate.as_bytes(), configured.as_bytes()),
        None => false,
    }
}

/// Constant-time byte comparison, avoided via `==` on purpose: spec.md §4.2
/// recommends (without requiring) a timing-safe compare for the token check.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
