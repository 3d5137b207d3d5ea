/**
 * Portfolio Routes
 * Public listing and admin CRUD for portfolio items
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{self, normalize_list, PortfolioCategory, PortfolioItem};
use crate::error::{ApiError, ApiResult, SuccessResponse};
use crate::routes::{extract::AdminUser, upload::remove_blob_for_url};
use crate::state::AppState;
use crate::store::{self, Direction, Record, Stored};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/portfolio
#[derive(Debug, Deserialize)]
pub struct PortfolioQuery {
    pub category: Option<String>,
}

/// Request body for POST /api/admin/portfolio
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortfolioRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub image_url: Option<String>,
}

/// Request body for PATCH /api/admin/portfolio/{id}
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePortfolioRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

fn parse_category(raw: &str) -> ApiResult<PortfolioCategory> {
    PortfolioCategory::parse(raw).ok_or_else(|| ApiError::Invalid {
        error: "Invalid category".to_string(),
        message: format!(
            "Category must be one of: {}",
            PortfolioCategory::ALL
                .iter()
                .map(PortfolioCategory::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

fn required(value: &str, name: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", name)));
    }
    Ok(value.to_string())
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /api/portfolio?category=... - Newest first
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<PortfolioQuery>,
) -> ApiResult<Json<Vec<Stored<PortfolioItem>>>> {
    let mut q = store::Query::new().order_by("createdAt", Direction::Desc);
    if let Some(raw) = query.category.as_deref().filter(|c| !c.is_empty()) {
        q = q.filter("category", parse_category(raw)?.as_str());
    }

    Ok(Json(state.documents.list_records::<PortfolioItem>(&q).await?))
}

/// GET /api/portfolio/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Stored<PortfolioItem>>> {
    state
        .documents
        .get_record::<PortfolioItem>(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

// ============================================================================
// Admin handlers
// ============================================================================

/// GET /api/admin/portfolio
pub async fn admin_list_items(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Stored<PortfolioItem>>>> {
    let items = state
        .documents
        .list_records::<PortfolioItem>(&store::Query::new().order_by("createdAt", Direction::Desc))
        .await?;
    Ok(Json(items))
}

/// POST /api/admin/portfolio
pub async fn create_item(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePortfolioRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = required(&payload.title, "Title")?;
    let description = required(&payload.description, "Description")?;
    let image_url = required(payload.image_url.as_deref().unwrap_or_default(), "Image")?;
    let category = payload
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(parse_category)
        .transpose()?;

    let now = Utc::now();
    let item = PortfolioItem {
        title,
        description,
        category,
        link: payload.link.filter(|l| !l.trim().is_empty()),
        technologies: normalize_list(payload.technologies),
        image_url: Some(image_url),
        created_at: now,
        updated_at: now,
    };

    let id = state.documents.insert_record(&item).await?;
    tracing::info!(id = %id, "Portfolio item created");

    Ok((StatusCode::CREATED, Json(Stored { id, record: item })))
}

/// GET /api/admin/portfolio/{id}
pub async fn admin_get_item(
    _admin: AdminUser,
    state: State<AppState>,
    id: Path<String>,
) -> ApiResult<Json<Stored<PortfolioItem>>> {
    get_item(state, id).await
}

/// PATCH /api/admin/portfolio/{id}
pub async fn update_item(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut payload): Json<UpdatePortfolioRequest>,
) -> ApiResult<Json<Stored<PortfolioItem>>> {
    if let Some(title) = payload.title.as_deref() {
        required(title, "Title")?;
    }
    if let Some(description) = payload.description.as_deref() {
        required(description, "Description")?;
    }
    payload.category = payload
        .category
        .as_deref()
        .map(|c| parse_category(c).map(|c| c.as_str().to_string()))
        .transpose()?;
    payload.technologies = payload.technologies.map(normalize_list);

    let mut patch = serde_json::to_value(&payload).map_err(store::StoreError::from)?;
    if let Value::Object(fields) = &mut patch {
        fields.insert(
            "updatedAt".to_string(),
            Value::String(models::format_timestamp(&Utc::now())),
        );
    }

    state
        .documents
        .update_record::<PortfolioItem>(&id, patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// DELETE /api/admin/portfolio/{id} - Remove the item, then its image
pub async fn delete_item(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let item = state
        .documents
        .get_record::<PortfolioItem>(&id)
        .await?
        .ok_or(ApiError::NotFound)?;

    state.documents.delete(PortfolioItem::COLLECTION, &id).await?;
    tracing::info!(id = %id, "Portfolio item deleted");

    remove_blob_for_url(&state, item.record.image_url.as_deref()).await;

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::{app, get_json, send};
    use crate::state::test_support::test_state;
    use crate::store::{BlobStore, DocumentStore};
    use bytes::Bytes;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_requires_image_before_store_call() {
        let ts = test_state();
        let (status, body) = send(
            app(ts.state.clone()),
            "POST",
            "/api/admin/portfolio",
            Some(json!({ "title": "Shop", "description": "An online shop" })),
            Some(&ts.bearer()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Image is required");
        assert_eq!(ts.documents.operation_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_category_is_rejected() {
        let ts = test_state();
        let (status, body) = send(
            app(ts.state.clone()),
            "POST",
            "/api/admin/portfolio",
            Some(json!({
                "title": "Shop",
                "description": "d",
                "imageUrl": "/files/portfolio/1_a.png",
                "category": "cooking"
            })),
            Some(&ts.bearer()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid category");
    }

    #[tokio::test]
    async fn test_public_listing_filters_by_category() {
        let ts = test_state();
        let bearer = ts.bearer();
        for (title, category) in [("App", "mobile"), ("Site", "web"), ("Other site", "WEB")] {
            let (status, _) = send(
                app(ts.state.clone()),
                "POST",
                "/api/admin/portfolio",
                Some(json!({
                    "title": title,
                    "description": "d",
                    "imageUrl": "https://cdn.example.com/x.png",
                    "category": category,
                    "technologies": ["Rust", "Rust", " "]
                })),
                Some(&bearer),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, all) = get_json(app(ts.state.clone()), "/api/portfolio").await;
        assert_eq!(all.as_array().unwrap().len(), 3);
        assert_eq!(all[0]["technologies"], json!(["Rust"]));

        let (_, web) = get_json(app(ts.state), "/api/portfolio?category=web").await;
        let web = web.as_array().unwrap();
        assert_eq!(web.len(), 2);
        assert!(web.iter().all(|i| i["category"] == "web"));
    }

    #[tokio::test]
    async fn test_delete_removes_document_and_image_blob() {
        let ts = test_state();
        let bearer = ts.bearer();
        ts.blobs
            .put(
                "portfolio/1700000000000_shot.png",
                Bytes::from_static(b"png"),
                "image/png",
                None,
            )
            .await
            .unwrap();

        let (_, created) = send(
            app(ts.state.clone()),
            "POST",
            "/api/admin/portfolio",
            Some(json!({
                "title": "Shop",
                "description": "d",
                "imageUrl": "/files/portfolio/1700000000000_shot.png"
            })),
            Some(&bearer),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            app(ts.state.clone()),
            "DELETE",
            &format!("/api/admin/portfolio/{}", id),
            None,
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(ts.documents.get("portfolio", &id).await.unwrap().is_none());
        assert!(ts
            .blobs
            .get("portfolio/1700000000000_shot.png")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_patch_merges_fields() {
        let ts = test_state();
        let bearer = ts.bearer();
        let (_, created) = send(
            app(ts.state.clone()),
            "POST",
            "/api/admin/portfolio",
            Some(json!({ "title": "Shop", "description": "d", "imageUrl": "/files/p/1_a.png" })),
            Some(&bearer),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, updated) = send(
            app(ts.state.clone()),
            "PATCH",
            &format!("/api/admin/portfolio/{}", id),
            Some(json!({ "category": "AI", "link": "https://shop.example" })),
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["category"], "ai");
        assert_eq!(updated["title"], "Shop");

        let (status, _) = send(
            app(ts.state),
            "PATCH",
            "/api/admin/portfolio/missing",
            Some(json!({ "title": "x" })),
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
