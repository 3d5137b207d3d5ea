/**
 * Message Routes
 * Admin inbox merged from the document store and the realtime tree
 */
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::Message;
use crate::error::{ApiError, ApiResult, SuccessResponse};
use crate::routes::extract::AdminUser;
use crate::state::AppState;
use crate::store::{self, Direction, Record, Stored};

/// Which backend a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStore {
    Primary,
    Secondary,
}

impl MessageStore {
    fn parse(value: &str) -> ApiResult<Self> {
        match value {
            "primary" => Ok(MessageStore::Primary),
            "secondary" => Ok(MessageStore::Secondary),
            _ => Err(ApiError::bad_request(
                "Store must be \"primary\" or \"secondary\"",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageEntry {
    pub store: MessageStore,
    #[serde(flatten)]
    pub message: Stored<Message>,
}

fn realtime_path(state: &AppState, id: &str) -> String {
    format!("{}/{}", state.config.realtime_messages_path, id)
}

async fn primary_messages(state: &AppState) -> Result<Vec<MessageEntry>, store::StoreError> {
    let messages = state
        .documents
        .list_records::<Message>(&store::Query::new().order_by("createdAt", Direction::Desc))
        .await?;
    Ok(messages
        .into_iter()
        .map(|message| MessageEntry {
            store: MessageStore::Primary,
            message,
        })
        .collect())
}

async fn secondary_messages(state: &AppState) -> Result<Vec<MessageEntry>, store::StoreError> {
    let tree = state
        .realtime
        .get(&state.config.realtime_messages_path)
        .await?;
    let Some(Value::Object(children)) = tree else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(children.len());
    for (id, value) in children {
        match serde_json::from_value::<Message>(value) {
            Ok(record) => entries.push(MessageEntry {
                store: MessageStore::Secondary,
                message: Stored { id, record },
            }),
            Err(e) => tracing::warn!(id = %id, "Skipping malformed realtime message: {}", e),
        }
    }
    Ok(entries)
}

/// GET /api/admin/messages - Both stores, newest first
pub async fn list_messages(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<MessageEntry>>> {
    let (primary, secondary) = tokio::join!(primary_messages(&state), secondary_messages(&state));

    let mut entries = match (primary, secondary) {
        (Err(e), Err(other)) => {
            tracing::error!("Secondary message store failed too: {}", other);
            return Err(e.into());
        }
        (Ok(mut primary), Ok(secondary)) => {
            primary.extend(secondary);
            primary
        }
        (Ok(entries), Err(e)) => {
            tracing::warn!("Failed to load messages from realtime store: {}", e);
            entries
        }
        (Err(e), Ok(entries)) => {
            tracing::warn!("Failed to load messages from document store: {}", e);
            entries
        }
    };

    entries.sort_by(|a, b| b.message.record.created_at.cmp(&a.message.record.created_at));
    Ok(Json(entries))
}

/// PATCH /api/admin/messages/{store}/{id}/read - Mark read in that store only
pub async fn mark_read(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path((store, id)): Path<(String, String)>,
) -> ApiResult<Json<SuccessResponse>> {
    match MessageStore::parse(&store)? {
        MessageStore::Primary => {
            let found = state
                .documents
                .update(Message::COLLECTION, &id, json!({ "read": true }))
                .await?;
            if !found {
                return Err(ApiError::NotFound);
            }
        }
        MessageStore::Secondary => {
            let path = realtime_path(&state, &id);
            if state.realtime.get(&path).await?.is_none() {
                return Err(ApiError::NotFound);
            }
            state.realtime.update(&path, json!({ "read": true })).await?;
        }
    }

    tracing::info!(id = %id, store = %store, "Message marked as read");
    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/admin/messages/{store}/{id} - Remove from that store only
pub async fn delete_message(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path((store, id)): Path<(String, String)>,
) -> ApiResult<Json<SuccessResponse>> {
    match MessageStore::parse(&store)? {
        MessageStore::Primary => {
            if !state.documents.delete(Message::COLLECTION, &id).await? {
                return Err(ApiError::NotFound);
            }
        }
        MessageStore::Secondary => {
            let path = realtime_path(&state, &id);
            if state.realtime.get(&path).await?.is_none() {
                return Err(ApiError::NotFound);
            }
            state.realtime.remove(&path).await?;
        }
    }

    tracing::info!(id = %id, store = %store, "Message deleted");
    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::{app, send};
    use crate::state::test_support::{test_state, TestState};
    use crate::store::{DocumentStore, RealtimeStore};
    use axum::http::StatusCode;

    fn message(name: &str, at: &str) -> Value {
        json!({
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "subject": "Hello",
            "message": "Body",
            "read": false,
            "source": "website",
            "ip": "10.0.0.1",
            "createdAt": at
        })
    }

    async fn seed(ts: &TestState) {
        ts.documents
            .insert("messages", Some("p1"), message("Ann", "2024-03-01T10:00:00.000000Z"))
            .await
            .unwrap();
        ts.documents
            .insert("messages", Some("p2"), message("Cat", "2024-03-03T10:00:00.000000Z"))
            .await
            .unwrap();
        ts.realtime
            .set("messages/s1", message("Bob", "2024-03-02T10:00:00.000Z"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_listing_merges_both_stores_newest_first() {
        let ts = test_state();
        seed(&ts).await;

        let (status, list) = send(
            app(ts.state.clone()),
            "GET",
            "/api/admin/messages",
            None,
            Some(&ts.bearer()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let list = list.as_array().unwrap();
        let ids: Vec<_> = list.iter().map(|m| m["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["p2", "s1", "p1"]);
        assert_eq!(list[0]["store"], "primary");
        assert_eq!(list[1]["store"], "secondary");
        assert_eq!(list[1]["name"], "Bob");
    }

    #[tokio::test]
    async fn test_mark_read_touches_only_the_named_store() {
        let ts = test_state();
        seed(&ts).await;
        let bearer = ts.bearer();

        let (status, _) = send(
            app(ts.state.clone()),
            "PATCH",
            "/api/admin/messages/secondary/s1/read",
            None,
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let s1 = ts.realtime.get("messages/s1").await.unwrap().unwrap();
        assert_eq!(s1["read"], true);
        assert_eq!(s1["name"], "Bob");

        let (status, _) = send(
            app(ts.state.clone()),
            "PATCH",
            "/api/admin/messages/primary/p1/read",
            None,
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let p1 = ts.documents.get("messages", "p1").await.unwrap().unwrap();
        assert_eq!(p1.data["read"], true);
        let p2 = ts.documents.get("messages", "p2").await.unwrap().unwrap();
        assert_eq!(p2.data["read"], false);

        let (status, _) = send(
            app(ts.state.clone()),
            "PATCH",
            "/api/admin/messages/primary/s1/read",
            None,
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            app(ts.state),
            "PATCH",
            "/api/admin/messages/tertiary/p1/read",
            None,
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_removes_from_one_store() {
        let ts = test_state();
        seed(&ts).await;
        let bearer = ts.bearer();

        let (status, _) = send(
            app(ts.state.clone()),
            "DELETE",
            "/api/admin/messages/secondary/s1",
            None,
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(ts.realtime.get("messages/s1").await.unwrap().is_none());
        assert_eq!(ts.documents.count("messages", &[]).await.unwrap(), 2);

        let (status, _) = send(
            app(ts.state),
            "DELETE",
            "/api/admin/messages/secondary/s1",
            None,
            Some(&bearer),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_listing_requires_admin() {
        let ts = test_state();
        let (status, _) = send(app(ts.state), "GET", "/api/admin/messages", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
