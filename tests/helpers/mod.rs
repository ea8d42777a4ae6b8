//! Test helper utilities: in-process fake services and app state builders

#![allow(dead_code)]

use a11y_assist::{
    app_state::{media_client, AppState, Settings},
    config::LanguageMap,
    db,
    models::scan::ScannerType,
    routes,
    services::{
        alt_text::{AltTextClient, AltTextSettings, ImageDetail},
        content_cache::{ContentCache, HttpFetcher},
        scanner::ScannerClient,
        signing::DemandSigner,
    },
};
use axum::Router;
use reqwest::Url;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: &str = "integration-secret";

/// Counts requests hitting a fake service.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serve `app` on an ephemeral localhost port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Endpoints the app under test talks to.
#[derive(Default)]
pub struct Remotes {
    pub scanner: Option<String>,
    pub ai: Option<String>,
    pub media_base_url: Option<String>,
    pub backend_edit_url: Option<String>,
    pub database_url: Option<String>,
    /// How long previews stay cached; 30 seconds when unset.
    pub preview_ttl: Option<Duration>,
}

pub fn signer() -> DemandSigner {
    DemandSigner::new(SECRET).unwrap()
}

pub fn build_state(remotes: Remotes) -> AppState {
    let timeout = Duration::from_secs(5);
    let database_url = remotes
        .database_url
        .unwrap_or_else(|| "postgres://a11y@127.0.0.1:1/a11y".to_string());

    let scanner = ScannerClient::new(remotes.scanner.as_deref(), Some("token"), timeout).unwrap();
    let alt_text = AltTextClient::new(AltTextSettings {
        api_key: remotes.ai.as_ref().map(|_| "key".to_string()),
        model: "gpt-4o-mini".to_string(),
        image_detail: ImageDetail::Auto,
        base_url: remotes.ai.unwrap_or_default(),
        disabled: false,
        timeout,
    })
    .unwrap();

    AppState::new(
        db::lazy_pool(&database_url).unwrap(),
        signer(),
        scanner,
        alt_text,
        ContentCache::with_limits(
            Arc::new(HttpFetcher::new(timeout).unwrap()),
            remotes.preview_ttl.unwrap_or(Duration::from_secs(30)),
            64,
        ),
        media_client(timeout).unwrap(),
        Settings {
            languages: LanguageMap::parse("0:en,1:de", "en"),
            scanner_type: ScannerType::Axe,
            backend_edit_url: remotes.backend_edit_url.map(|u| Url::parse(&u).unwrap()),
            media_base_url: remotes.media_base_url.map(|u| Url::parse(&u).unwrap()),
        },
    )
}

/// Start the API with `remotes` and return its base URL.
pub async fn spawn_app(remotes: Remotes) -> String {
    serve(routes::api_router(build_state(remotes))).await
}
