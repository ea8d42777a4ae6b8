//! Remote scanner client.
//!
//! Wraps the two calls the scanner exposes: create a scan and look one up.
//! Every call is a single attempt with a fixed timeout; retrying is left to
//! the caller. Transport, status and decoding problems are logged here and
//! collapse into a generic `Failure` outcome so nothing internal leaks out.

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::models::scan::{RemoteJob, ScanTarget};

/// Outcome of `POST /scans`.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateScanOutcome {
    Created(RemoteJob),
    /// No base URL or token configured; nothing was sent.
    Unconfigured,
    Failure,
}

/// Outcome of `GET /scans/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanStatusOutcome {
    Found(RemoteJob),
    /// The scanner no longer knows this job; create a new one.
    NotFound,
    Unconfigured,
    Failure,
}

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("HTTP request to scanner failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scanner returned unexpected HTTP {0}")]
    Status(StatusCode),

    #[error("Failed to parse scanner response: {0}")]
    Parse(#[from] serde_json::Error),
}

struct Endpoint {
    base_url: String,
    api_token: String,
}

/// Client for the external accessibility scanner.
pub struct ScannerClient {
    http: Client,
    endpoint: Option<Endpoint>,
}

impl ScannerClient {
    /// Create a client. Blank or missing credentials leave it unconfigured.
    pub fn new(
        base_url: Option<&str>,
        api_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ScannerError> {
        let http = Client::builder().timeout(timeout).build()?;

        let endpoint = match (non_blank(base_url), non_blank(api_token)) {
            (Some(base_url), Some(api_token)) => Some(Endpoint {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_token: api_token.to_string(),
            }),
            _ => None,
        };

        Ok(Self { http, endpoint })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Ask the scanner to scan `target`.
    pub async fn create_scan(&self, target: &ScanTarget) -> CreateScanOutcome {
        let Some(endpoint) = &self.endpoint else {
            return CreateScanOutcome::Unconfigured;
        };

        match self.send_create(endpoint, target).await {
            Ok(job) => {
                tracing::info!(scan_id = %job.id, url = %target.url, "Remote scan created");
                metrics::counter!("scanner_scans_created_total").increment(1);
                CreateScanOutcome::Created(job)
            }
            Err(e) => {
                tracing::error!(url = %target.url, error = %e, "Failed to create remote scan");
                metrics::counter!("scanner_failures_total", "operation" => "create").increment(1);
                CreateScanOutcome::Failure
            }
        }
    }

    /// Look up the current state of scan `scan_id`.
    pub async fn scan_status(&self, scan_id: &str) -> ScanStatusOutcome {
        let Some(endpoint) = &self.endpoint else {
            return ScanStatusOutcome::Unconfigured;
        };

        let url = format!("{}/scans/{}", endpoint.base_url, scan_id);
        let response = match self
            .http
            .get(&url)
            .bearer_auth(&endpoint.api_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return self.status_failure(scan_id, ScannerError::Http(e));
            }
        };

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                tracing::debug!(scan_id, "Remote scan no longer exists");
                return ScanStatusOutcome::NotFound;
            }
            status => return self.status_failure(scan_id, ScannerError::Status(status)),
        }

        match decode_job(response).await {
            Ok(job) => ScanStatusOutcome::Found(job),
            Err(e) => self.status_failure(scan_id, e),
        }
    }

    async fn send_create(
        &self,
        endpoint: &Endpoint,
        target: &ScanTarget,
    ) -> Result<RemoteJob, ScannerError> {
        let response = self
            .http
            .post(format!("{}/scans", endpoint.base_url))
            .bearer_auth(&endpoint.api_token)
            .json(target)
            .send()
            .await?;

        // A 404 here is an ordinary failure; only lookups treat it specially.
        if response.status() != StatusCode::CREATED {
            return Err(ScannerError::Status(response.status()));
        }

        decode_job(response).await
    }

    fn status_failure(&self, scan_id: &str, error: ScannerError) -> ScanStatusOutcome {
        tracing::error!(scan_id, error = %error, "Failed to fetch remote scan status");
        metrics::counter!("scanner_failures_total", "operation" => "status").increment(1);
        ScanStatusOutcome::Failure
    }
}

async fn decode_job(response: reqwest::Response) -> Result<RemoteJob, ScannerError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
