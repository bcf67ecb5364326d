use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::request_context::AuthContext;
use crate::error::AppError;
use crate::server::AppState;

/// Extract `<token>` from `Authorization: Bearer <token>`. The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Middleware gate for protected routes: resolves the bearer token with the identity
/// provider and stores an `AuthContext` in request extensions. Short-circuits on failure.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(auth) = state.auth.clone() else {
        return AppError::unavailable("auth_unavailable", "Authentication service not initialized").into_response();
    };
    let Some(token) = bearer_token(req.headers()).map(|t| t.to_string()) else {
        debug!(target: "auth", path = %req.uri().path(), "missing or malformed authorization header");
        return AppError::unauthorized("missing_token", "Missing or invalid authorization header").into_response();
    };
    match auth.resolve_user(&token).await {
        Ok(principal) => {
            req.extensions_mut().insert(AuthContext { principal, access_token: token });
            next.run(req).await
        }
        Err(e) => {
            warn!(target: "auth", "token rejected: {:#}", e);
            AppError::unauthorized("invalid_token", "Invalid or expired token").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn parses_bearer_tokens() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
    }
}
