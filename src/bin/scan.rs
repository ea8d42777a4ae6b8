//! Scan a page preview from the command line.
//!
//! Usage: scan <page-id> <preview-url> [language-id]
//!
//! Signs a scan demand, creates the remote scan, follows it until it
//! finishes and prints the final state together with the local audit.

use a11y_assist::{
    config::AppConfig,
    models::demand::{DemandContext, ScanDemand},
    models::scan::{ScanTarget, ScanUiState},
    services::{
        audit,
        content_cache::{ContentCache, HttpFetcher},
        poller::StatusPoller,
        scanner::{CreateScanOutcome, ScannerClient},
        signing::DemandSigner,
    },
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 2000;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let usage = "usage: scan <page-id> <preview-url> [language-id]";
    let page_id: u32 = args.next().ok_or(usage)?.parse()?;
    let preview_url = args.next().ok_or(usage)?;
    let language_id: i32 = args.next().map(|a| a.parse()).transpose()?.unwrap_or(0);

    let config = AppConfig::from_env()?;
    let signer = DemandSigner::new(&config.demand_secret)?;

    let context = DemandContext {
        user_id: 0,
        page_id,
        language_id,
        workspace_id: 0,
    };
    let demand = ScanDemand::new(&signer, context, preview_url);
    if !demand.validate_signature(&signer) {
        return Err("freshly signed demand failed verification".into());
    }

    let scanner = Arc::new(ScannerClient::new(
        config.scanner_base_url.as_deref(),
        config.scanner_api_token.as_deref(),
        config.remote_timeout(),
    )?);
    let cache = ContentCache::new(Arc::new(HttpFetcher::new(config.remote_timeout())?));

    let local = audit::audit_url(&cache, demand.preview_url()).await?;

    let target = ScanTarget {
        url: demand.preview_url().to_string(),
        language: config.languages().code(language_id).to_string(),
        scanner_type: config.scanner_type,
    };

    let remote = match scanner.create_scan(&target).await {
        CreateScanOutcome::Created(job) => {
            tracing::info!(scan_id = %job.id, "Following remote scan");
            let interval = Duration::from_millis(POLL_INTERVAL_MS);
            let poller = StatusPoller::new(Arc::clone(&scanner), interval);
            let mut rx = poller.spawn(job.id);
            let state = rx.wait_for(|state| state.is_terminal()).await?.clone();
            state
        }
        CreateScanOutcome::Unconfigured => ScanUiState::Unavailable,
        CreateScanOutcome::Failure => ScanUiState::Failed {
            reason: "Scanner rejected the scan".to_string(),
        },
    };

    let output = serde_json::json!({
        "demand": demand,
        "remote": remote,
        "local": local,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    let remote_ok = !matches!(remote, ScanUiState::Failed { .. });
    Ok(local.passed() && remote_ok)
}
