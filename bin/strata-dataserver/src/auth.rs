//! Bearer token middleware for the data endpoints
//!
//! Resolves the caller from `Authorization: Bearer <token>`, attaches the
//! [`User`] and [`TraceId`] to the request and runs the rest of the stack
//! inside a span carrying the trace id.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use strata_auth::{AuthError, TokenVerifier};
use strata_common::{TRACE_ID_HEADER, User};
use tracing::{Instrument, debug, field, info_span, warn};

/// Authentication state shared across requests
#[derive(Clone)]
pub struct AuthState {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthState {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

/// Trace identifier of the current request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceId(pub String);

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

fn trace_id(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string)
}

/// Authentication middleware layer
pub async fn auth_layer(
    State(auth): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let tid = trace_id(request.headers());

    let user: User = match bearer_token(request.headers()) {
        Ok(token) => match auth.verifier.verify(token).await {
            Ok(user) => user,
            Err(e) => {
                warn!(trace_id = %tid, "rejecting request: {}", e);
                return StatusCode::UNAUTHORIZED.into_response();
            }
        },
        Err(e) => {
            warn!(trace_id = %tid, "rejecting request: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
    debug!(trace_id = %tid, "authenticated user: {}", user.username);

    let span = info_span!(
        "request",
        trace_id = %tid,
        user = %user.username,
        extra = field::Empty,
    );
    request.extensions_mut().insert(user);
    request.extensions_mut().insert(TraceId(tid.clone()));

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&tid) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingAuthHeader)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::InvalidAuthHeader)
        ));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn test_trace_id_generated_when_absent() {
        let mut headers = HeaderMap::new();
        let generated = trace_id(&headers);
        assert_eq!(generated.len(), 36);

        headers.insert(TRACE_ID_HEADER, HeaderValue::from_static("tid-42"));
        assert_eq!(trace_id(&headers), "tid-42");
    }
}
