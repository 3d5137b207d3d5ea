/**
 * Contact Routes
 * Public contact form: per-IP submission cap, then a dual write to the
 * document store and the realtime tree
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::models::{format_timestamp, Message};
use crate::error::{ApiError, ApiResult};
use crate::routes::extract::ClientIp;
use crate::state::AppState;
use crate::store::{self, Filter, Record, StoreError};

const SEND_FAILED: &str = "Failed to send your message. Please try again later.";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

/// Which stores accepted the message
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredIn {
    pub primary: bool,
    pub secondary: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    pub id: String,
    pub stored: StoredIn,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactStatus {
    pub submissions: u64,
    pub limit: u64,
    pub limited: bool,
}

fn validate(req: &ContactRequest) -> ApiResult<()> {
    let missing = [
        ("Name", &req.name),
        ("Email", &req.email),
        ("Subject", &req.subject),
        ("Message", &req.message),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());

    if let Some((field, _)) = missing {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    if !req.email.contains('@') {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    Ok(())
}

/// Messages stored in the primary store from `ip`, limited to the configured
/// window when one is set.
async fn submission_count(state: &AppState, ip: &str) -> Result<u64, StoreError> {
    match state.config.contact_window {
        None => {
            state
                .documents
                .count(
                    Message::COLLECTION,
                    &[Filter {
                        field: "ip".to_string(),
                        value: ip.into(),
                    }],
                )
                .await
        }
        Some(window) => {
            let cutoff = chrono::Duration::from_std(window)
                .map(|w| format_timestamp(&(Utc::now() - w)))
                .unwrap_or_default();
            let recent = state
                .documents
                .query(Message::COLLECTION, &store::Query::new().filter("ip", ip))
                .await?
                .into_iter()
                .filter(|doc| {
                    doc.field("createdAt")
                        .and_then(|v| v.as_str())
                        .is_some_and(|at| at >= cutoff.as_str())
                })
                .count();
            Ok(recent as u64)
        }
    }
}

/// GET /api/contact/status - How many messages the caller has sent
pub async fn contact_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> ApiResult<Json<ContactStatus>> {
    let submissions = submission_count(&state, &ip).await?;
    let limit = state.config.contact_limit;
    Ok(Json(ContactStatus {
        submissions,
        limit,
        limited: submissions >= limit,
    }))
}

/// POST /api/contact - Accept a contact form submission
pub async fn submit_contact(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(payload): Json<ContactRequest>,
) -> ApiResult<impl IntoResponse> {
    validate(&payload)?;

    match submission_count(&state, &ip).await {
        Ok(count) if count >= state.config.contact_limit => {
            tracing::warn!(ip = %ip, count, "Contact submission limit reached");
            return Err(ApiError::TooManyRequests(
                state.config.contact_limit_message(),
            ));
        }
        Ok(_) => {}
        Err(e) => {
            // A failed lookup does not block the visitor
            tracing::warn!(ip = %ip, "Failed to count previous submissions: {}", e);
        }
    }

    let message = Message {
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_string(),
        subject: payload.subject.trim().to_string(),
        message: payload.message.trim().to_string(),
        read: false,
        source: "website".to_string(),
        ip: ip.clone(),
        created_at: Utc::now(),
    };
    let data = serde_json::to_value(&message).map_err(StoreError::from)?;
    let id = uuid::Uuid::new_v4().to_string();

    let primary = match state
        .documents
        .insert(Message::COLLECTION, Some(&id), data.clone())
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(id = %id, "Failed to store message in document store: {}", e);
            false
        }
    };

    let path = format!("{}/{}", state.config.realtime_messages_path, id);
    let secondary = match state.realtime.set(&path, data).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(id = %id, "Failed to store message in realtime store: {}", e);
            false
        }
    };

    if !primary && !secondary {
        return Err(ApiError::internal(SEND_FAILED, "both message stores rejected the write"));
    }

    tracing::info!(id = %id, ip = %ip, primary, secondary, "Contact message received");
    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            success: true,
            id,
            stored: StoredIn { primary, secondary },
            message: "Message sent successfully".to_string(),
        }),
    ))
}
