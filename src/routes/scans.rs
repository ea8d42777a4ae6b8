use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::demand::ScanDemand;
use crate::models::scan::{RemoteJob, ScanTarget, ScanUiState};
use crate::routes::authorize;
use crate::routes::error::ApiError;
use crate::services::scanner::CreateScanOutcome;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub scan_id: Option<String>,
    #[serde(flatten)]
    pub state: ScanUiState,
}

/// POST /api/v1/scans: start a remote scan of the demanded preview.
pub async fn create_scan(
    State(state): State<AppState>,
    Json(demand): Json<ScanDemand>,
) -> Result<Json<ScanResponse>, ApiError> {
    authorize(&state.signer, &demand)?;

    let job = start_scan(&state, &demand).await?;

    Ok(Json(ScanResponse {
        state: ScanUiState::from_job(&job),
        scan_id: Some(job.id),
    }))
}

/// POST /api/v1/scans/status: current state of the page's scan.
///
/// A scan the scanner has forgotten is replaced by a fresh one.
pub async fn scan_status(
    State(state): State<AppState>,
    Json(demand): Json<ScanDemand>,
) -> Result<Json<ScanResponse>, ApiError> {
    authorize(&state.signer, &demand)?;

    let page_scan = queries::get_page_scan(
        &state.db,
        demand.page_id(),
        demand.language_id(),
        demand.workspace_id(),
    )
    .await?;

    let Some(page_scan) = page_scan else {
        return Ok(Json(ScanResponse {
            scan_id: None,
            state: ScanUiState::Idle,
        }));
    };

    let outcome = state.scanner.scan_status(&page_scan.scan_id).await;
    match ScanUiState::from_status_outcome(&outcome) {
        Some(ScanUiState::Expired) => {
            tracing::info!(
                page_id = demand.page_id(),
                scan_id = %page_scan.scan_id,
                "Remote scan expired, creating a new one"
            );
            queries::delete_page_scan(
                &state.db,
                demand.page_id(),
                demand.language_id(),
                demand.workspace_id(),
            )
            .await?;

            let job = start_scan(&state, &demand).await?;
            Ok(Json(ScanResponse {
                state: ScanUiState::from_job(&job),
                scan_id: Some(job.id),
            }))
        }
        Some(ui_state) => Ok(Json(ScanResponse {
            scan_id: Some(page_scan.scan_id),
            state: ui_state,
        })),
        None => Err(ApiError::Upstream),
    }
}

async fn start_scan(state: &AppState, demand: &ScanDemand) -> Result<RemoteJob, ApiError> {
    if demand.preview_url().is_empty() {
        return Err(ApiError::Validation("previewUrl is required to scan".to_string()));
    }

    let target = ScanTarget {
        url: demand.preview_url().to_string(),
        language: state.settings.languages.code(demand.language_id()).to_string(),
        scanner_type: state.settings.scanner_type,
    };

    match state.scanner.create_scan(&target).await {
        CreateScanOutcome::Created(job) => {
            queries::upsert_page_scan(
                &state.db,
                demand.page_id(),
                demand.language_id(),
                demand.workspace_id(),
                &job.id,
            )
            .await?;

            // A new scan means the page changed; drop the stale preview.
            state.previews.invalidate(demand.preview_url());
            Ok(job)
        }
        CreateScanOutcome::Unconfigured => Err(ApiError::Unavailable("Scanner")),
        CreateScanOutcome::Failure => Err(ApiError::Upstream),
    }
}
