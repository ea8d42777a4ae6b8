use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Scanner engine requested from the remote scanner.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScannerType {
    #[default]
    Axe,
    Htmlcs,
}

/// Status vocabulary of the remote scanner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    #[serde(alias = "succeeded")]
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// A scan job owned by the remote scanner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteJob {
    pub id: String,
    pub status: ScanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// What gets scanned: body of `POST /scans`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanTarget {
    pub url: String,
    pub language: String,
    pub scanner_type: ScannerType,
}

/// Remote scan registered for a page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageScan {
    pub page_id: u32,
    pub language_id: i32,
    pub workspace_id: u32,
    pub scan_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scan state as shown to the editor.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanUiState {
    Idle,
    Queued,
    Running,
    Completed { result: Option<serde_json::Value> },
    Failed { reason: String },
    /// The remote job is gone; a new scan must be created.
    Expired,
    /// Scanner credentials are not configured.
    Unavailable,
}

impl ScanUiState {
    /// Map a remote job status onto the editor-facing state.
    pub fn from_job(job: &RemoteJob) -> Self {
        match job.status {
            ScanStatus::Pending => ScanUiState::Queued,
            ScanStatus::Running | ScanStatus::Unknown => ScanUiState::Running,
            ScanStatus::Completed => ScanUiState::Completed {
                result: job.result.clone(),
            },
            ScanStatus::Failed => ScanUiState::Failed {
                reason: "Remote scan failed".to_string(),
            },
        }
    }

    /// Polling stops once a terminal state is reached.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanUiState::Completed { .. }
                | ScanUiState::Failed { .. }
                | ScanUiState::Expired
                | ScanUiState::Unavailable
        )
    }
}
