/**
 * Authentication Routes
 * JWT-based authentication with login, verify, refresh, and logout
 */
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::identity::{UserInfo, ACCESS_TOKEN_EXPIRY_MINUTES};
use crate::routes::extract::{bearer_token, session_cookie, ClientIp, SESSION_COOKIE};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Admin email, or the configured username alias
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserInfo,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub is_valid: bool,
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// ============================================================================
// Session cookie
// ============================================================================

fn session_cookie_header(token: &str, max_age_secs: i64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(value) = cookie {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
/// Authenticate the admin and return tokens; also sets the session cookie
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Response> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let session = state
        .identity
        .login(&ip, &payload.email, &payload.password)
        .await?;

    let cookie = session_cookie_header(
        &session.tokens.access_token,
        ACCESS_TOKEN_EXPIRY_MINUTES * 60,
        state.config.is_production(),
    );
    let response = (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            user: session.user,
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
        }),
    )
        .into_response();

    Ok(with_cookie(response, cookie))
}

/// POST /api/auth/verify
/// Verify access token (header or cookie) and return user info
pub async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = bearer_token(&headers).or_else(|| session_cookie(&headers)) else {
        return Json(VerifyResponse {
            success: false,
            is_valid: false,
            user: None,
            error: Some("No authorization token provided".to_string()),
        });
    };

    match state.identity.verify_access_token(token) {
        Ok(claims) => Json(VerifyResponse {
            success: true,
            is_valid: true,
            user: Some(claims.into()),
            error: None,
        }),
        Err(e) => Json(VerifyResponse {
            success: false,
            is_valid: false,
            user: None,
            error: Some(e.to_string()),
        }),
    }
}

/// POST /api/auth/refresh
/// Rotate the refresh token and issue a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    let tokens = state.identity.refresh(&payload.refresh_token).await?;
    Ok(Json(RefreshResponse {
        success: true,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// POST /api/auth/logout
/// Revoke refresh token(s) and clear the session cookie. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<LogoutRequest>>,
) -> Response {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let access_token = payload
        .access_token
        .as_deref()
        .or_else(|| bearer_token(&headers))
        .or_else(|| session_cookie(&headers));

    state
        .identity
        .logout(payload.refresh_token.as_deref(), access_token)
        .await;

    let cookie = session_cookie_header("", 0, state.config.is_production());
    with_cookie(
        (StatusCode::OK, Json(LogoutResponse { success: true })).into_response(),
        cookie,
    )
}
