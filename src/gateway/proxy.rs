//! Fail-closed proxy gate: every request that falls through the router is
//! checked against the route policy, authenticated when required, and
//! forwarded to the upstream with the verified identity injected.

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::handlers::authenticate;
use super::AppState;
use crate::config::IDENTITY_HEADER;
use crate::error::{Error, Result};

/// Hop-by-hop headers, never forwarded in either direction (RFC 9110 §7.6.1).
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Fallback handler for everything outside the authentication routes.
pub async fn forward(
    Extension(state): Extension<Arc<AppState>>,
    request: Request<Body>,
) -> Response {
    match forward_inner(&state, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn forward_inner(state: &AppState, request: Request<Body>) -> Result<Response> {
    let path = request.uri().path().to_string();

    let identity = if state.config.route_policy.requires_token(&path) {
        Some(authenticate(state, request.headers())?)
    } else {
        None
    };

    let mut url = state.config.upstream.clone();
    url.set_path(&path);
    url.set_query(request.uri().query());

    let method = request.method().clone();
    let mut headers = outbound_headers(request.headers());
    if let Some(identity) = &identity {
        headers.insert(
            IDENTITY_HEADER,
            HeaderValue::from_str(&identity.user_id.to_string())
                .map_err(|_| Error::authentication("invalid access token"))?,
        );
    }

    let body = to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| Error::validation(format!("unreadable request body: {err}")))?;

    debug!(%method, path, authenticated = identity.is_some(), "forwarding to upstream");

    let upstream = state
        .client
        .request(method, url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|err| {
            error!("upstream request failed: {err}");
            Error::Internal(err.into())
        })?;

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let headers = inbound_headers(upstream.headers());
    let bytes = upstream.bytes().await.map_err(|err| {
        error!("upstream response body failed: {err}");
        Error::Internal(err.into())
    })?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Headers to send upstream: drop hop-by-hop headers, `host` and
/// `content-length` (the client recomputes both), and any inbound identity
/// header so callers cannot spoof it.
fn outbound_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            !HOP_BY_HOP.contains(&name)
                && name != IDENTITY_HEADER
                && name != header::HOST.as_str()
                && name != header::CONTENT_LENGTH.as_str()
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Headers to relay back to the caller: drop hop-by-hop headers and
/// `content-length`, which axum sets from the relayed body.
fn inbound_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            !HOP_BY_HOP.contains(&name) && name != header::CONTENT_LENGTH.as_str()
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_headers_strip_identity_and_host() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("gateway.local"));
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("spoofed"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let out = outbound_headers(&headers);
        assert!(out.get("host").is_none());
        assert!(out.get(IDENTITY_HEADER).is_none());
        assert!(out.get("connection").is_none());
        assert_eq!(out.get("x-custom").map(|v| v.to_str().ok()), Some(Some("kept")));
        assert!(out.get("accept").is_some());
    }

    #[test]
    fn test_inbound_headers_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let relayed = inbound_headers(&headers);
        assert!(relayed.get("transfer-encoding").is_none());
        assert!(relayed.get("content-type").is_some());
    }
}
