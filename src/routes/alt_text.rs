use axum::extract::State;
use axum::Json;
use garde::Validate;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::app_state::AppState;
use crate::models::demand::AltTextDemand;
use crate::models::edit_link::RecordEditLink;
use crate::routes::authorize;
use crate::routes::error::ApiError;
use crate::services::alt_text::AltTextError;

const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Request to generate alt text for a record's image.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AltTextRequest {
    #[garde(dive)]
    pub demand: AltTextDemand,

    #[garde(url, length(max = 2048))]
    pub image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AltTextResponse {
    pub alt_text: String,
    /// Generated text per demanded column.
    pub values: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_link: Option<RecordEditLink>,
}

/// POST /api/v1/alt-text: generate alt text for the demanded record.
pub async fn generate_alt_text(
    State(state): State<AppState>,
    Json(request): Json<AltTextRequest>,
) -> Result<Json<AltTextResponse>, ApiError> {
    request
        .validate()
        .map_err(|report| ApiError::Validation(report.to_string()))?;
    let demand = &request.demand;
    authorize(&state.signer, demand)?;

    if !state.alt_text.is_configured() {
        return Err(ApiError::Unavailable("AI alt text generation"));
    }

    let Some(media_base) = &state.settings.media_base_url else {
        return Err(ApiError::Unavailable("Media base URL"));
    };
    let image_url = Url::parse(&request.image_url)
        .map_err(|_| ApiError::Validation("imageUrl is not a valid URL".to_string()))?;
    if !is_media_url(media_base, &image_url) {
        tracing::warn!(image_url = %image_url, "Image outside media base URL");
        return Err(ApiError::Forbidden("Image URL is not allowed"));
    }

    let (image_bytes, mime_type) =
        download_image(&state.media, &image_url, MAX_IMAGE_BYTES).await?;
    let language = state.settings.languages.code(demand.language_id());

    let alt_text = state
        .alt_text
        .generate(&image_bytes, mime_type, language)
        .await
        .map_err(|e| match e {
            AltTextError::Unconfigured => ApiError::Unavailable("AI alt text generation"),
            other => {
                tracing::error!(
                    table = demand.table(),
                    record_id = demand.record_id(),
                    error = %other,
                    "Alt text generation failed"
                );
                ApiError::Upstream
            }
        })?;

    tracing::info!(
        table = demand.table(),
        record_id = demand.record_id(),
        user_id = demand.context().user_id,
        "Alt text generated"
    );

    let values = demand
        .columns()
        .iter()
        .map(|column| (column.clone(), alt_text.clone()))
        .collect();

    let edit_link = match (&state.settings.backend_edit_url, demand.columns().first()) {
        (Some(base), Some(column)) => Some(RecordEditLink::new(
            base,
            demand.table(),
            demand.record_id(),
            column,
        )),
        _ => None,
    };

    Ok(Json(AltTextResponse {
        alt_text,
        values,
        edit_link,
    }))
}

/// Whether `candidate` lies below `base`: same scheme, host and port, and
/// `base`'s path segments are a prefix of the candidate's.
fn is_media_url(base: &Url, candidate: &Url) -> bool {
    if base.scheme() != candidate.scheme()
        || base.host_str() != candidate.host_str()
        || base.port_or_known_default() != candidate.port_or_known_default()
        || !candidate.username().is_empty()
        || candidate.password().is_some()
    {
        return false;
    }

    let segments = |url: &Url| -> Vec<String> {
        url.path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default()
    };
    let base_segments = segments(base);
    let candidate_segments = segments(candidate);

    candidate_segments.len() > base_segments.len()
        && candidate_segments.starts_with(&base_segments)
}

/// Download an image of at most `limit` bytes and sniff its format.
async fn download_image(
    http: &reqwest::Client,
    url: &Url,
    limit: usize,
) -> Result<(Vec<u8>, &'static str), ApiError> {
    let failed = |e: reqwest::Error| {
        tracing::error!(url = %url, error = %e, "Image download failed");
        ApiError::Upstream
    };
    let too_large = || ApiError::Validation("Image is too large".to_string());

    let mut response = http.get(url.clone()).send().await.map_err(failed)?;

    if !response.status().is_success() {
        tracing::error!(url = %url, status = %response.status(), "Image download failed");
        return Err(ApiError::Upstream);
    }

    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(failed)? {
        if bytes.len() + chunk.len() > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    let format = image::guess_format(&bytes)
        .map_err(|_| ApiError::Validation("Unsupported image format".to_string()))?;

    Ok((bytes, format.to_mime_type()))
}
