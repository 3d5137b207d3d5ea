/**
 * Partner Routes
 * Ordered partner logos: public listing, admin CRUD and reordering
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::{self, Partner};
use crate::error::{ApiError, ApiResult, SuccessResponse};
use crate::routes::{extract::AdminUser, upload::remove_blob_for_url};
use crate::state::AppState;
use crate::store::{self, Direction, Record, Stored};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartnerRequest {
    #[serde(default)]
    pub name: String,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    pub order: Option<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartnerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: String,
}

async fn sorted_partners(state: &AppState) -> ApiResult<Vec<Stored<Partner>>> {
    Ok(state
        .documents
        .list_records::<Partner>(&store::Query::new().order_by("order", Direction::Asc))
        .await?)
}

/// GET /api/partners - Ordered by `order` ascending
pub async fn list_partners(State(state): State<AppState>) -> ApiResult<Json<Vec<Stored<Partner>>>> {
    Ok(Json(sorted_partners(&state).await?))
}

/// GET /api/admin/partners
pub async fn admin_list_partners(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Stored<Partner>>>> {
    Ok(Json(sorted_partners(&state).await?))
}

/// POST /api/admin/partners - Appends after the current last partner unless `order` is given
pub async fn create_partner(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePartnerRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }

    let order = match payload.order {
        Some(order) => order,
        None => sorted_partners(&state)
            .await?
            .iter()
            .map(|p| p.record.order)
            .max()
            .map_or(0, |max| max + 1),
    };

    let now = Utc::now();
    let partner = Partner {
        name,
        website: payload.website.filter(|w| !w.trim().is_empty()),
        logo_url: payload.logo_url.filter(|l| !l.trim().is_empty()),
        order,
        created_at: now,
        updated_at: now,
    };

    let id = state.documents.insert_record(&partner).await?;
    tracing::info!(id = %id, order, "Partner created");

    Ok((StatusCode::CREATED, Json(Stored { id, record: partner })))
}

/// PATCH /api/admin/partners/{id}
pub async fn update_partner(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePartnerRequest>,
) -> ApiResult<Json<Stored<Partner>>> {
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Name is required"));
    }

    let mut patch = serde_json::to_value(&payload).map_err(store::StoreError::from)?;
    if let Value::Object(fields) = &mut patch {
        fields.insert(
            "updatedAt".to_string(),
            Value::String(models::format_timestamp(&Utc::now())),
        );
    }

    state
        .documents
        .update_record::<Partner>(&id, patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// DELETE /api/admin/partners/{id} - Remove the partner, then its logo
pub async fn delete_partner(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let partner = state
        .documents
        .get_record::<Partner>(&id)
        .await?
        .ok_or(ApiError::NotFound)?;

    state.documents.delete(Partner::COLLECTION, &id).await?;
    tracing::info!(id = %id, "Partner deleted");

    remove_blob_for_url(&state, partner.record.logo_url.as_deref()).await;

    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/admin/partners/{id}/move - Swap `order` with the neighbour and
/// return the re-sorted list. Moving past either end changes nothing.
pub async fn move_partner(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MoveRequest>,
) -> ApiResult<Json<Vec<Stored<Partner>>>> {
    let up = match payload.direction.as_str() {
        "up" => true,
        "down" => false,
        _ => return Err(ApiError::bad_request("Direction must be \"up\" or \"down\"")),
    };

    let partners = sorted_partners(&state).await?;
    let index = partners
        .iter()
        .position(|p| p.id == id)
        .ok_or(ApiError::NotFound)?;

    let neighbour = match (up, index) {
        (true, 0) => None,
        (true, i) => Some(i - 1),
        (false, i) if i + 1 < partners.len() => Some(i + 1),
        (false, _) => None,
    };
    let Some(neighbour) = neighbour else {
        return Ok(Json(partners));
    };

    let updated_at = models::format_timestamp(&Utc::now());

    // Duplicate orders make a swap ambiguous; renumber everyone 0..n first
    let duplicated = partners
        .windows(2)
        .any(|pair| pair[0].record.order == pair[1].record.order);
    let (mine, theirs) = if duplicated {
        for (position, partner) in partners.iter().enumerate() {
            let position = position as i64;
            if partner.record.order != position {
                state
                    .documents
                    .update(
                        Partner::COLLECTION,
                        &partner.id,
                        json!({ "order": position, "updatedAt": updated_at }),
                    )
                    .await?;
            }
        }
        (index as i64, neighbour as i64)
    } else {
        (partners[index].record.order, partners[neighbour].record.order)
    };

    state
        .documents
        .update(
            Partner::COLLECTION,
            &partners[index].id,
            json!({ "order": theirs, "updatedAt": updated_at }),
        )
        .await?;
    state
        .documents
        .update(
            Partner::COLLECTION,
            &partners[neighbour].id,
            json!({ "order": mine, "updatedAt": updated_at }),
        )
        .await?;

    tracing::info!(id = %id, direction = %payload.direction, "Partner moved");
    Ok(Json(sorted_partners(&state).await?))
}
