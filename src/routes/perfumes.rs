use axum::extract::{Path, State};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::models::perfume::{PerfumePatch, PerfumeRecord};

/// GET /api/v1/admin/perfumes/{id}
pub async fn get_perfume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PerfumeRecord>, AppError> {
    state
        .catalog
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("perfume {}", id)))
}

/// PATCH /api/v1/admin/perfumes/{id} — absent fields keep their stored value.
pub async fn update_perfume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<PerfumePatch>,
) -> Result<Json<PerfumeRecord>, AppError> {
    patch.validate()?;

    let updated = state
        .catalog
        .update(id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("perfume {}", id)))?;
    tracing::info!(id = %id, "Perfume updated");
    Ok(Json(updated))
}
