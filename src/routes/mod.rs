use axum::routing::{get, post};
use axum::Router;
use garde::Validate;

use crate::app_state::AppState;
use crate::services::signing::{DemandSigner, Signable};

pub mod alt_text;
pub mod audit;
pub mod error;
pub mod health;
pub mod metrics;
pub mod scans;

use error::ApiError;

/// Health and API routes. Metrics and middleware are layered on in `main`.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/scans", post(scans::create_scan))
        .route("/api/v1/scans/status", post(scans::scan_status))
        .route("/api/v1/audit", post(audit::audit_page))
        .route("/api/v1/alt-text", post(alt_text::generate_alt_text))
        .with_state(state)
}

/// Gate every handler must pass before reading a demand's fields.
pub(crate) fn authorize<T>(signer: &DemandSigner, demand: &T) -> Result<(), ApiError>
where
    T: Signable + Validate<Context = ()>,
{
    demand
        .validate()
        .map_err(|report| ApiError::Validation(report.to_string()))?;

    if !signer.verify_value(demand) {
        tracing::warn!(demand = T::TAG, "Rejected demand with invalid signature");
        ::metrics::counter!("demand_signature_rejections_total", "demand" => T::TAG).increment(1);
        return Err(ApiError::SignatureMismatch);
    }

    Ok(())
}
