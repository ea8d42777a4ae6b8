use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::models::scan::ScanUiState;
use crate::services::scanner::{ScanStatusOutcome, ScannerClient};

const DEFAULT_MAX_FAILURES: u32 = 3;

impl ScanUiState {
    /// Map one status lookup onto the editor-facing state.
    ///
    /// Returns `None` for a transient failure, meaning "keep the last state".
    pub fn from_status_outcome(outcome: &ScanStatusOutcome) -> Option<Self> {
        match outcome {
            ScanStatusOutcome::Found(job) => Some(ScanUiState::from_job(job)),
            ScanStatusOutcome::NotFound => Some(ScanUiState::Expired),
            ScanStatusOutcome::Unconfigured => Some(ScanUiState::Unavailable),
            ScanStatusOutcome::Failure => None,
        }
    }
}

/// Follows a remote scan until it finishes.
pub struct StatusPoller {
    scanner: Arc<ScannerClient>,
    interval: Duration,
    max_failures: u32,
}

impl StatusPoller {
    pub fn new(scanner: Arc<ScannerClient>, interval: Duration) -> Self {
        Self {
            scanner,
            interval,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }

    /// Give up after this many consecutive failed lookups.
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    /// Start polling `scan_id` in the background.
    ///
    /// The receiver always holds the state of the most recent poll. Polling
    /// stops on a terminal state or as soon as every receiver is dropped.
    pub fn spawn(&self, scan_id: String) -> watch::Receiver<ScanUiState> {
        let (tx, rx) = watch::channel(ScanUiState::Idle);
        let scanner = Arc::clone(&self.scanner);
        let interval = self.interval;
        let max_failures = self.max_failures;

        tokio::spawn(async move {
            let mut failures = 0;

            loop {
                let outcome = scanner.scan_status(&scan_id).await;
                let state = match ScanUiState::from_status_outcome(&outcome) {
                    Some(state) => {
                        failures = 0;
                        state
                    }
                    None => {
                        failures += 1;
                        tracing::warn!(scan_id = %scan_id, failures, "Scan status poll failed");
                        if failures >= max_failures {
                            ScanUiState::Failed {
                                reason: "Scanner unreachable".to_string(),
                            }
                        } else {
                            tx.borrow().clone()
                        }
                    }
                };

                let terminal = state.is_terminal();
                tx.send_replace(state);
                if terminal {
                    tracing::debug!(scan_id = %scan_id, "Scan polling finished");
                    break;
                }

                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = tx.closed() => {
                        tracing::debug!(scan_id = %scan_id, "Scan polling cancelled");
                        break;
                    }
                }
            }
        });

        rx
    }
}
