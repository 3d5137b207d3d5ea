/**
 * Health Routes
 * Endpoints for checking backend health status
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::state::AppState;
use crate::store::StoreError;

/// Single service check result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceCheck {
    fn from_ping(result: Result<Duration, StoreError>) -> Self {
        match result {
            Ok(duration) => ServiceCheck {
                status: "healthy".to_string(),
                response_time: Some(duration.as_millis() as u64),
                error: None,
            },
            Err(e) => ServiceCheck {
                status: "unhealthy".to_string(),
                response_time: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Detailed health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub checks: HealthChecks,
}

/// Health checks for all backends
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub documents: ServiceCheck,
    pub realtime: ServiceCheck,
    pub blobs: ServiceCheck,
}

/// Ready check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// GET /health - Simple health ping
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/detailed - All backends plus uptime. "degraded" when any check fails.
pub async fn health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    let (documents, realtime, blobs) = tokio::join!(
        state.documents.ping(),
        state.realtime.ping(),
        state.blobs.ping()
    );

    let checks = HealthChecks {
        documents: ServiceCheck::from_ping(documents),
        realtime: ServiceCheck::from_ping(realtime),
        blobs: ServiceCheck::from_ping(blobs),
    };
    let all_healthy =
        checks.documents.is_healthy() && checks.realtime.is_healthy() && checks.blobs.is_healthy();

    let response = DetailedHealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs(),
        checks,
    };

    (StatusCode::OK, Json(response))
}

/// GET /health/database - Document store check
pub async fn health_database(State(state): State<AppState>) -> impl IntoResponse {
    let check = ServiceCheck::from_ping(state.documents.ping().await);
    (StatusCode::OK, Json(check))
}

/// GET /health/ready - Ready once the document store answers
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.started_at.elapsed().as_secs();

    match state.documents.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready".to_string(),
                timestamp: Utc::now(),
                uptime,
                reason: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "not ready".to_string(),
                    timestamp: Utc::now(),
                    uptime,
                    reason: Some("Document store is not reachable".to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::test_config;
    use crate::routes::test_helpers::{app, get_json};
    use crate::state::test_support::test_state;
    use crate::store::{BlobStore, Blob, MemoryDocumentStore, MemoryRealtimeStore, ProgressCallback};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;

    struct UnreachableBlobs;

    #[async_trait]
    impl BlobStore for UnreachableBlobs {
        async fn put(
            &self,
            _: &str,
            _: Bytes,
            _: &str,
            _: Option<ProgressCallback<'_>>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn get(&self, _: &str) -> Result<Option<Blob>, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
        async fn ping(&self) -> Result<Duration, StoreError> {
            Err(StoreError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_service_check_has_required_fields() {
        let check = ServiceCheck::from_ping(Ok(Duration::from_millis(10)));
        let json = serde_json::to_string(&check).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("responseTime"));
    }

    #[tokio::test]
    async fn test_health_ping_returns_ok() {
        let ts = test_state();
        let (status, body) = get_json(app(ts.state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_detailed_reports_every_backend() {
        let ts = test_state();
        let (status, body) = get_json(app(ts.state), "/health/detailed").await;
        assert_eq!(status, StatusCode::OK);
        let body: DetailedHealthResponse = serde_json::from_value(body).unwrap();
        assert_eq!(body.status, "ok");
        assert!(body.checks.documents.is_healthy());
        assert!(body.checks.realtime.is_healthy());
        assert!(body.checks.blobs.is_healthy());
    }

    #[tokio::test]
    async fn test_health_detailed_degraded_when_blobs_down() {
        let state = AppState::new(
            test_config(),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryRealtimeStore::new()),
            Arc::new(UnreachableBlobs),
        );
        let (status, body) = get_json(app(state), "/health/detailed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["checks"]["blobs"]["status"], "unhealthy");
        assert_eq!(body["checks"]["blobs"]["error"], "offline");
    }

    #[tokio::test]
    async fn test_health_database_and_ready() {
        let ts = test_state();
        let (status, body) = get_json(app(ts.state.clone()), "/health/database").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = get_json(app(ts.state), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }
}
