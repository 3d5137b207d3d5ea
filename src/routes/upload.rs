/**
 * Upload Routes
 * Admin image uploads into blob storage, and public serving of stored blobs
 */
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::routes::extract::AdminUser;
use crate::state::AppState;
use crate::store::blob::{self, UploadProgress};

const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB
const MAX_LOGO_SIZE: usize = 2 * 1024 * 1024; // 2MB
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Blob key prefix, one per feature that owns images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Blog,
    Portfolio,
    Partners,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Blog => "blog",
            Namespace::Portfolio => "portfolio",
            Namespace::Partners => "partners",
        }
    }

    pub fn max_size(&self) -> usize {
        match self {
            Namespace::Partners => MAX_LOGO_SIZE,
            _ => MAX_FILE_SIZE,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "blog" => Some(Namespace::Blog),
            "portfolio" => Some(Namespace::Portfolio),
            "partners" => Some(Namespace::Partners),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
    pub size: usize,
    pub mime_type: String,
}

fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Delete the blob behind a stored image URL. Failures are logged, never surfaced.
pub async fn remove_blob_for_url(state: &AppState, url: Option<&str>) {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return;
    };
    let Some(key) = blob::key_from_url(url) else {
        tracing::debug!(url = %url, "Image URL does not point at blob storage, skipping");
        return;
    };

    match state.blobs.delete(&key).await {
        Ok(true) => tracing::info!(key = %key, "Blob deleted"),
        Ok(false) => tracing::warn!(key = %key, "Blob already missing"),
        Err(e) => tracing::warn!(key = %key, "Failed to delete blob: {}", e),
    }
}

/// POST /api/admin/uploads/{namespace} - Store one image and return its URL
pub async fn upload_image(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let namespace = Namespace::parse(&namespace)
        .ok_or_else(|| ApiError::bad_request("Unknown upload namespace"))?;

    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return Err(ApiError::bad_request("No file provided")),
        Err(e) => {
            tracing::error!("Multipart error: {}", e);
            return Err(ApiError::bad_request("Invalid multipart data"));
        }
    };

    let original_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if !ALLOWED_EXTENSIONS.contains(&extension_of(&original_name).as_str()) {
        return Err(ApiError::bad_request(
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.",
        ));
    }

    let bytes = field.bytes().await.map_err(|e| {
        tracing::error!("Failed to read upload bytes: {}", e);
        ApiError::bad_request("Failed to read file data")
    })?;

    if bytes.is_empty() {
        return Err(ApiError::bad_request("Empty file"));
    }
    if bytes.len() > namespace.max_size() {
        return Err(ApiError::PayloadTooLarge(format!(
            "File too large. Maximum size is {}MB.",
            namespace.max_size() / (1024 * 1024)
        )));
    }

    let mime_type = blob::sniff_image_type(&bytes).ok_or_else(|| {
        ApiError::bad_request("File content does not match an allowed image type.")
    })?;

    let key = blob::blob_key(
        namespace.as_str(),
        &original_name,
        Utc::now().timestamp_millis(),
    );
    let size = bytes.len();
    let report = |p: UploadProgress| {
        tracing::debug!(
            key = %key,
            transferred = p.bytes_transferred,
            total = p.total_bytes,
            "Upload progress {:.0}%",
            p.percent()
        );
    };

    state
        .blobs
        .put(&key, bytes, mime_type, Some(&report))
        .await?;

    let url = blob::blob_url(&state.config.public_base_url, &key);
    tracing::info!("Image uploaded: {} ({} bytes)", key, size);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url,
            key,
            size,
            mime_type: mime_type.to_string(),
        }),
    ))
}

/// GET /files/{*key} - Stream a stored blob with its content type
pub async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    if blob::validate_key(&key).is_err() {
        return Err(ApiError::bad_request("Invalid file key"));
    }

    let blob = state.blobs.get(&key).await?.ok_or(ApiError::NotFound)?;
    Ok((
        [
            (header::CONTENT_TYPE, blob.content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        blob.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::app;
    use crate::state::test_support::test_state;
    use crate::store::BlobStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_request(uri: &str, bearer: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                b = BOUNDARY,
                f = filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::post(uri)
            .header("authorization", bearer)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn status_and_json(res: Response) -> (StatusCode, serde_json::Value) {
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (
            status,
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null),
        )
    }

    #[test]
    fn test_namespace_limits() {
        assert_eq!(Namespace::Partners.max_size(), 2 * 1024 * 1024);
        assert_eq!(Namespace::Blog.max_size(), 5 * 1024 * 1024);
        assert_eq!(Namespace::parse("partners"), Some(Namespace::Partners));
        assert_eq!(Namespace::parse("avatars"), None);
    }

    #[tokio::test]
    async fn test_upload_stores_blob_and_serves_it() {
        let ts = test_state();
        let req = multipart_request("/api/admin/uploads/portfolio", &ts.bearer(), "shot.png", PNG);
        let res = app(ts.state.clone()).oneshot(req).await.unwrap();
        let (status, body) = status_and_json(res).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["mimeType"], "image/png");

        let key = body["key"].as_str().unwrap().to_string();
        assert!(key.starts_with("portfolio/"));
        assert!(key.ends_with("_shot.png"));
        assert_eq!(body["url"], format!("/files/{}", key));
        assert!(ts.blobs.get(&key).await.unwrap().is_some());

        let res = app(ts.state)
            .oneshot(
                Request::get(format!("/files/{}", key))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], PNG);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_extension_and_spoofed_content() {
        let ts = test_state();
        let bearer = ts.bearer();

        let req = multipart_request("/api/admin/uploads/blog", &bearer, "notes.txt", PNG);
        let (status, _) = status_and_json(app(ts.state.clone()).oneshot(req).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = multipart_request("/api/admin/uploads/blog", &bearer, "fake.png", b"<svg/>");
        let (status, body) =
            status_and_json(app(ts.state.clone()).oneshot(req).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "File content does not match an allowed image type.");

        let req = multipart_request("/api/admin/uploads/avatars", &bearer, "a.png", PNG);
        let (status, _) = status_and_json(app(ts.state).oneshot(req).await.unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_partner_logo_size_limit() {
        let ts = test_state();
        let mut data = PNG.to_vec();
        data.resize(MAX_LOGO_SIZE + 1, 0);
        let req = multipart_request("/api/admin/uploads/partners", &ts.bearer(), "logo.png", &data);
        let (status, _) = status_and_json(app(ts.state).oneshot(req).await.unwrap()).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_upload_requires_auth() {
        let ts = test_state();
        let req = multipart_request("/api/admin/uploads/blog", "Bearer nope", "a.png", PNG);
        let (status, _) = status_and_json(app(ts.state).oneshot(req).await.unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let ts = test_state();
        let res = app(ts.state)
            .oneshot(
                Request::get("/files/blog/nothing.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
