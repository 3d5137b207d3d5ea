/**
 * Request Extractors
 * Admin authentication, client IP and the /admin page guard
 */
use axum::{
    extract::{connect_info::MockConnectInfo, ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, Extensions, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::{convert::Infallible, net::SocketAddr};

use crate::error::ApiError;
use crate::identity::{Claims, UserInfo};
use crate::state::AppState;

/// Cookie carrying the access token for the admin pages
pub const SESSION_COOKIE: &str = "admin_token";

/// Extract bearer token from Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|v| !v.is_empty())
}

fn verified_claims(headers: &HeaderMap, state: &AppState) -> Option<Claims> {
    [bearer_token(headers), session_cookie(headers)]
        .into_iter()
        .flatten()
        .find_map(|token| state.identity.verify_access_token(token).ok())
}

/// The authenticated admin. Rejects with 401 when no valid token is present.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserInfo);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if bearer_token(&parts.headers).is_none() && session_cookie(&parts.headers).is_none() {
            return Err(ApiError::Unauthorized("Authorization required".to_string()));
        }
        verified_claims(&parts.headers, state)
            .map(|claims| AdminUser(claims.into()))
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))
    }
}

/// Resolve the caller's IP: the first `X-Forwarded-For` hop when proxies are
/// trusted, otherwise the socket peer.
pub fn resolve_client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|MockConnectInfo(addr)| *addr)
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(resolve_client_ip(
            &parts.headers,
            &parts.extensions,
            state.config.trust_proxy,
        )))
    }
}

fn is_admin_page(path: &str) -> bool {
    path == "/admin" || path.starts_with("/admin/")
}

/// Redirect unauthenticated visitors of `/admin` pages to `/login`.
pub async fn require_admin_page(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_admin_page(request.uri().path()) && verified_claims(request.headers(), &state).is_none()
    {
        tracing::debug!(path = %request.uri().path(), "Redirecting unauthenticated admin page");
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_and_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; admin_token=xyz; other=1"),
        );
        assert_eq!(bearer_token(&headers), Some("abc"));
        assert_eq!(session_cookie(&headers), Some("xyz"));

        let empty = HeaderMap::new();
        assert_eq!(bearer_token(&empty), None);
        assert_eq!(session_cookie(&empty), None);
    }

    #[test]
    fn test_client_ip_prefers_forwarded_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 9], 4000))));

        assert_eq!(resolve_client_ip(&headers, &extensions, true), "203.0.113.7");
        assert_eq!(resolve_client_ip(&headers, &extensions, false), "10.0.0.9");
        assert_eq!(
            resolve_client_ip(&HeaderMap::new(), &Extensions::new(), false),
            "unknown"
        );
    }

    #[test]
    fn test_client_ip_reads_mocked_peer() {
        let mut extensions = Extensions::new();
        extensions.insert(MockConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5000))));
        assert_eq!(
            resolve_client_ip(&HeaderMap::new(), &extensions, false),
            "192.0.2.4"
        );
    }

    #[test]
    fn test_admin_page_paths() {
        assert!(is_admin_page("/admin"));
        assert!(is_admin_page("/admin/blog"));
        assert!(!is_admin_page("/administrator"));
        assert!(!is_admin_page("/api/admin/stats"));
    }
}
