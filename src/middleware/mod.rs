// HTTP middleware: request correlation and credential normalization

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation context attached to every inbound request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub started_at: Instant,
}

impl RequestContext {
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Tag the request with a correlation id, log receipt and completion with
/// the status code and elapsed milliseconds, and echo the id back in the
/// response headers
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let context = RequestContext { request_id: request_id.clone(), started_at: Instant::now() };
    request.extensions_mut().insert(context.clone());

    tracing::info!(request_id = %request_id, %method, %path, "Request received");

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    tracing::info!(
        request_id = %request_id,
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = context.elapsed_ms(),
        "Request completed"
    );
    response
}

/// Normalize the three accepted credential header forms into one value:
/// `X-API-Key: <key>`, `Authorization: Bearer <key>`, `Authorization: <key>`
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(key.to_string());
    }

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())?;
    let key = auth.strip_prefix("Bearer ").unwrap_or(auth).trim();
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Best-effort client IP: forwarded headers first, then the socket peer
pub fn client_ip(headers: &HeaderMap, peer: &SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return real_ip.to_string();
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn api_key_header_wins() {
        let map = headers(&[("x-api-key", "abc"), ("authorization", "Bearer xyz")]);
        assert_eq!(extract_credential(&map).as_deref(), Some("abc"));
    }

    #[test]
    fn bearer_and_bare_authorization_both_work() {
        let map = headers(&[("authorization", "Bearer xyz")]);
        assert_eq!(extract_credential(&map).as_deref(), Some("xyz"));

        let map = headers(&[("authorization", "xyz")]);
        assert_eq!(extract_credential(&map).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_credential_is_none() {
        assert_eq!(extract_credential(&HeaderMap::new()), None);
        let map = headers(&[("authorization", "Bearer ")]);
        assert_eq!(extract_credential(&map), None);
    }

    #[test]
    fn client_ip_prefers_forwarded_chain_head() {
        let peer: SocketAddr = "192.168.1.5:443".parse().unwrap();
        let map = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(client_ip(&map, &peer), "203.0.113.9");

        let map = headers(&[("x-real-ip", "203.0.113.7")]);
        assert_eq!(client_ip(&map, &peer), "203.0.113.7");

        assert_eq!(client_ip(&HeaderMap::new(), &peer), "192.168.1.5");
    }
}
