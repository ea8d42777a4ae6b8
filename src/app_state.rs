use reqwest::Url;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{AppConfig, LanguageMap};
use crate::models::scan::ScannerType;
use crate::services::{
    alt_text::{AltTextClient, AltTextError},
    content_cache::{ContentCache, HttpFetcher},
    scanner::{ScannerClient, ScannerError},
    signing::{DemandSigner, SigningError},
};

/// Route-level settings derived from configuration.
pub struct Settings {
    pub languages: LanguageMap,
    pub scanner_type: ScannerType,
    pub backend_edit_url: Option<Url>,
    pub media_base_url: Option<Url>,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub signer: Arc<DemandSigner>,
    pub scanner: Arc<ScannerClient>,
    pub alt_text: Arc<AltTextClient>,
    pub previews: Arc<ContentCache>,
    pub media: reqwest::Client,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        signer: DemandSigner,
        scanner: ScannerClient,
        alt_text: AltTextClient,
        previews: ContentCache,
        media: reqwest::Client,
        settings: Settings,
    ) -> Self {
        Self {
            db,
            signer: Arc::new(signer),
            scanner: Arc::new(scanner),
            alt_text: Arc::new(alt_text),
            previews: Arc::new(previews),
            media,
            settings: Arc::new(settings),
        }
    }

    /// Build every service from configuration.
    pub fn from_config(config: &AppConfig, db: PgPool) -> Result<Self, StartupError> {
        let timeout = config.remote_timeout();

        let signer = DemandSigner::new(&config.demand_secret)?;
        let scanner = ScannerClient::new(
            config.scanner_base_url.as_deref(),
            config.scanner_api_token.as_deref(),
            timeout,
        )?;
        let alt_text = AltTextClient::new(config.alt_text_settings())?;
        let previews = ContentCache::with_limits(
            Arc::new(HttpFetcher::new(timeout)?),
            config.preview_cache_ttl(),
            config.preview_cache_capacity,
        );
        let media = media_client(timeout)?;

        let settings = Settings {
            languages: config.languages(),
            scanner_type: config.scanner_type,
            backend_edit_url: parse_url("BACKEND_EDIT_URL", &config.backend_edit_url)?,
            media_base_url: parse_url("MEDIA_BASE_URL", &config.media_base_url)?,
        };

        Ok(Self::new(db, signer, scanner, alt_text, previews, media, settings))
    }
}

/// Client for image downloads. Redirects are not followed, so an allowed
/// media URL cannot bounce the request to another host.
pub fn media_client(timeout: std::time::Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

fn parse_url(name: &'static str, value: &Option<String>) -> Result<Option<Url>, StartupError> {
    let Some(raw) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    Url::parse(raw)
        .map(Some)
        .map_err(|e| StartupError::InvalidUrl {
            name,
            reason: e.to_string(),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Invalid demand secret: {0}")]
    Signing(#[from] SigningError),

    #[error("Failed to initialize scanner client: {0}")]
    Scanner(#[from] ScannerError),

    #[error("Failed to initialize AI client: {0}")]
    AltText(#[from] AltTextError),

    #[error("Failed to initialize HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
}
