/**
 * Blog Routes
 * Public read endpoints and admin CRUD for blog posts
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::{self, normalize_list, BlogPost};
use crate::error::{ApiError, ApiResult, SuccessResponse};
use crate::routes::{extract::AdminUser, upload::remove_blob_for_url};
use crate::state::AppState;
use crate::store::{self, Direction, Record, Stored};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/blog (list)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    pub tag: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

/// Response for GET /api/blog (list)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListResponse {
    pub items: Vec<BlogPostSummary>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Blog post summary (for list view)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    #[serde(with = "models::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<Stored<BlogPost>> for BlogPostSummary {
    fn from(stored: Stored<BlogPost>) -> Self {
        let post = stored.record;
        Self {
            id: stored.id,
            title: post.title,
            slug: post.slug,
            excerpt: post.excerpt,
            author: post.author,
            category: post.category,
            tags: post.tags,
            cover_image: post.cover_image,
            created_at: post.created_at,
        }
    }
}

/// Request body for POST /api/admin/blog
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogRequest {
    #[serde(default)]
    pub title: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Option<String>,
    pub seo_optimized: Option<bool>,
    pub published: Option<bool>,
}

/// Request body for PATCH /api/admin/blog/{id}. Only given fields change.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo_optimized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

// ============================================================================
// Validation
// ============================================================================

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Derive a slug from a title: lowercase, runs of other characters become one hyphen.
pub fn slugify(title: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&title.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Sanitize HTML content using ammonia
fn sanitize_html(html: &str) -> String {
    ammonia::clean(html)
}

fn invalid_slug() -> ApiError {
    ApiError::Invalid {
        error: "Invalid slug".to_string(),
        message: "Slug must contain only lowercase letters, numbers, and hyphens".to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fails with 409 when another post already uses `slug`.
async fn ensure_slug_free(state: &AppState, slug: &str, except_id: Option<&str>) -> ApiResult<()> {
    let taken = state
        .documents
        .query(
            BlogPost::COLLECTION,
            &store::Query::new().filter("slug", slug),
        )
        .await?
        .into_iter()
        .any(|doc| Some(doc.id.as_str()) != except_id);
    if taken {
        return Err(ApiError::Conflict("Slug already exists".to_string()));
    }
    Ok(())
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /api/blog - List published posts with pagination
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> ApiResult<Json<BlogListResponse>> {
    let page_size = query.page_size.clamp(1, 100);
    let page = query.page.max(1);
    let offset = usize::try_from((page - 1).saturating_mul(page_size)).unwrap_or(usize::MAX);

    let posts = state
        .documents
        .list_records::<BlogPost>(
            &store::Query::new()
                .filter("published", true)
                .order_by("createdAt", Direction::Desc),
        )
        .await?;

    let tag = non_empty(query.tag);
    let matching: Vec<Stored<BlogPost>> = posts
        .into_iter()
        .filter(|p| match &tag {
            Some(tag) => p.record.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
            None => true,
        })
        .collect();

    let total = matching.len() as i64;
    let items = matching
        .into_iter()
        .skip(offset)
        .take(page_size as usize)
        .map(BlogPostSummary::from)
        .collect();

    Ok(Json(BlogListResponse {
        items,
        page,
        page_size,
        total,
    }))
}

/// GET /api/blog/{slug} - Get a single published post
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Stored<BlogPost>>> {
    if !is_valid_slug(&slug) {
        return Err(invalid_slug());
    }

    state
        .documents
        .list_records::<BlogPost>(
            &store::Query::new()
                .filter("slug", slug.as_str())
                .filter("published", true)
                .limit(1),
        )
        .await?
        .into_iter()
        .next()
        .map(Json)
        .ok_or(ApiError::NotFound)
}

// ============================================================================
// Admin handlers
// ============================================================================

/// GET /api/admin/blog - Every post, newest first
pub async fn admin_list_posts(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Stored<BlogPost>>>> {
    let posts = state
        .documents
        .list_records::<BlogPost>(&store::Query::new().order_by("createdAt", Direction::Desc))
        .await?;
    Ok(Json(posts))
}

/// POST /api/admin/blog - Create a post (unpublished unless told otherwise)
pub async fn create_post(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBlogRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    if payload.content.trim().is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }

    let slug = non_empty(payload.slug).unwrap_or_else(|| slugify(&title));
    if !is_valid_slug(&slug) {
        return Err(invalid_slug());
    }
    ensure_slug_free(&state, &slug, None).await?;

    let now = Utc::now();
    let post = BlogPost {
        title,
        slug,
        content: sanitize_html(&payload.content),
        excerpt: non_empty(payload.excerpt),
        author: non_empty(payload.author),
        category: non_empty(payload.category),
        tags: normalize_list(payload.tags),
        cover_image: non_empty(payload.cover_image),
        meta_title: non_empty(payload.meta_title),
        meta_description: non_empty(payload.meta_description),
        keywords: non_empty(payload.keywords),
        seo_optimized: payload.seo_optimized.unwrap_or(false),
        published: payload.published.unwrap_or(false),
        created_at: now,
        updated_at: now,
    };

    let id = state.documents.insert_record(&post).await?;
    tracing::info!(id = %id, slug = %post.slug, "Blog post created");

    Ok((StatusCode::CREATED, Json(Stored { id, record: post })))
}

/// GET /api/admin/blog/{id}
pub async fn admin_get_post(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Stored<BlogPost>>> {
    state
        .documents
        .get_record::<BlogPost>(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// PATCH /api/admin/blog/{id} - Merge the given fields and refresh updatedAt
pub async fn update_post(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut payload): Json<UpdateBlogRequest>,
) -> ApiResult<Json<Stored<BlogPost>>> {
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }
    if payload.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ApiError::bad_request("Content is required"));
    }
    if let Some(slug) = payload.slug.as_deref() {
        if !is_valid_slug(slug) {
            return Err(invalid_slug());
        }
        ensure_slug_free(&state, slug, Some(&id)).await?;
    }

    payload.content = payload.content.map(|c| sanitize_html(&c));
    payload.tags = payload.tags.map(normalize_list);

    let mut patch = serde_json::to_value(&payload).map_err(store::StoreError::from)?;
    if let Value::Object(fields) = &mut patch {
        fields.insert(
            "updatedAt".to_string(),
            Value::String(models::format_timestamp(&Utc::now())),
        );
    }

    state
        .documents
        .update_record::<BlogPost>(&id, patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// DELETE /api/admin/blog/{id} - Remove the post, then its cover image
pub async fn delete_post(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let post = state
        .documents
        .get_record::<BlogPost>(&id)
        .await?
        .ok_or(ApiError::NotFound)?;

    state.documents.delete(BlogPost::COLLECTION, &id).await?;
    tracing::info!(id = %id, "Blog post deleted");

    remove_blob_for_url(&state, post.record.cover_image.as_deref()).await;

    Ok(Json(SuccessResponse { success: true }))
}
