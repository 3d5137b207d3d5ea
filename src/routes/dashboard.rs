/**
 * Dashboard Routes
 * Admin counters and the password-change screen
 */
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::db::models::{BlogPost, Message, Partner, PortfolioItem};
use crate::error::{ApiResult, SuccessResponse};
use crate::routes::extract::AdminUser;
use crate::state::AppState;
use crate::store::{Filter, Record};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub portfolio: u64,
    pub blog: u64,
    pub partners: u64,
    pub messages: u64,
    pub unread: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// GET /api/admin/stats - Collection counts from the document store
pub async fn stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<DashboardStats>> {
    let docs = &state.documents;
    let unread = [Filter {
        field: "read".to_string(),
        value: false.into(),
    }];

    let (portfolio, blog, partners, messages, unread) = tokio::try_join!(
        docs.count(PortfolioItem::COLLECTION, &[]),
        docs.count(BlogPost::COLLECTION, &[]),
        docs.count(Partner::COLLECTION, &[]),
        docs.count(Message::COLLECTION, &[]),
        docs.count(Message::COLLECTION, &unread),
    )?;

    Ok(Json(DashboardStats {
        portfolio,
        blog,
        partners,
        messages,
        unread,
    }))
}

/// POST /api/admin/settings/password
pub async fn change_password(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    state
        .identity
        .change_password(
            &payload.current_password,
            &payload.new_password,
            &payload.confirm_password,
        )
        .await?;

    tracing::info!(email = %admin.0.email, "Password updated from settings");
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::TEST_PASSWORD;
    use crate::routes::test_helpers::{app, send};
    use crate::state::test_support::test_state;
    use crate::store::DocumentStore;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_stats_counts_collections_and_unread() {
        let ts = test_state();
        for (id, read) in [("a", false), ("b", true), ("c", false)] {
            ts.documents
                .insert("messages", Some(id), json!({ "name": id, "read": read }))
                .await
                .unwrap();
        }
        ts.documents
            .insert("blog", None, json!({ "title": "Post" }))
            .await
            .unwrap();

        let (status, body) = send(
            app(ts.state.clone()),
            "GET",
            "/api/admin/stats",
            None,
            Some(&ts.bearer()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stats: DashboardStats = serde_json::from_value(body).unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                portfolio: 0,
                blog: 1,
                partners: 0,
                messages: 3,
                unread: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_change_password_then_login_with_new_one() {
        let ts = test_state();
        let bearer = ts.bearer();

        let (status, body) = send(
            app(ts.state.clone()),
            "POST",
            "/api/admin/settings/password",
            Some(json!({
                "currentPassword": "wrong",
                "newPassword": "brand-new-pass",
                "confirmPassword": "brand-new-pass"
            })),
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(
            app(ts.state.clone()),
            "POST",
            "/api/admin/settings/password",
            Some(json!({
                "currentPassword": TEST_PASSWORD,
                "newPassword": "brand-new-pass",
                "confirmPassword": "brand-new-pass"
            })),
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(ts
            .documents
            .get("settings", "admin_credentials")
            .await
            .unwrap()
            .is_some());

        let (status, _) = send(
            app(ts.state),
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "owner@studio.dev", "password": "brand-new-pass" })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let ts = test_state();
        let (status, body) = send(
            app(ts.state.clone()),
            "POST",
            "/api/admin/settings/password",
            Some(json!({
                "currentPassword": TEST_PASSWORD,
                "newPassword": "abc",
                "confirmPassword": "abc"
            })),
            Some(&ts.bearer()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Password must be at least 6 characters long");
    }
}
