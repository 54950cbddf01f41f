//! Middleware for authentication and other cross-cutting concerns

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::GatewayError;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Session token from the `Authorization` header, or `?token=` for sockets.
pub fn extract_token(request: &Request) -> Option<String> {
    bearer_token(request.headers()).or_else(|| {
        Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.is_empty())
    })
}

/// Authentication middleware that validates session tokens
///
/// The resolved [`AuthUser`](crate::state::AuthUser) is stored in the request
/// extensions.
pub async fn auth_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = extract_token(&request)
        .ok_or_else(|| GatewayError::Unauthorized("Missing authentication token".to_string()))?;

    let user = state.authenticate(&token).await?;
    tracing::debug!(user_id = %user.id, "request authenticated");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Create tracing middleware
pub fn create_trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        path = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

/// CORS for browser clients; credentials travel in the `Authorization` header.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, authorization: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_token_from_header_or_query() {
        assert_eq!(
            extract_token(&request("/api/chats", Some("Bearer abc"))),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_token(&request("/ws?token=xyz", None)),
            Some("xyz".to_string())
        );
        assert_eq!(
            extract_token(&request("/ws?token=xyz", Some("Bearer abc"))),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_missing_or_malformed_token() {
        assert_eq!(extract_token(&request("/api/chats", None)), None);
        assert_eq!(extract_token(&request("/api/chats", Some("Basic abc"))), None);
        assert_eq!(extract_token(&request("/ws?token=", None)), None);
    }
}
