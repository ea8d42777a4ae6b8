use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::demand::ScanDemand;
use crate::routes::authorize;
use crate::routes::error::ApiError;
use crate::services::audit::{self, AuditReport};

/// POST /api/v1/audit: local alt text, heading and landmark checks of the
/// demanded preview.
pub async fn audit_page(
    State(state): State<AppState>,
    Json(demand): Json<ScanDemand>,
) -> Result<Json<AuditReport>, ApiError> {
    authorize(&state.signer, &demand)?;

    if demand.preview_url().is_empty() {
        return Err(ApiError::Validation("previewUrl is required to audit".to_string()));
    }

    let report = audit::audit_url(&state.previews, demand.preview_url())
        .await
        .map_err(|e| {
            tracing::error!(page_id = demand.page_id(), error = %e, "Preview fetch failed");
            ApiError::Upstream
        })?;

    Ok(Json(report))
}
