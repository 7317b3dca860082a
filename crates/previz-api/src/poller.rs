use scenes::{ParsingStatus, Scene, ScriptStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::source::DataSource;

/// Cancellation flag for a running poll. Cloning shares the flag.
#[derive(Debug, Clone)]
pub struct PollCancel {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for PollCancel {
    fn default() -> Self {
        Self::new()
    }
}

impl PollCancel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`PollCancel::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Parsed with scenes; the list was fetched exactly once.
    Parsed {
        status: ParsingStatus,
        scenes: Vec<Scene>,
    },
    /// Parsed, but the script produced no scenes. Nothing was fetched.
    ParsedEmpty(ParsingStatus),
    /// Parsing failed on the backend. Nothing was fetched.
    Failed(ParsingStatus),
}

/// Polls `GET /scripts/{id}/status` until the script reaches a terminal
/// state, the attempt cap is hit, or the poll is cancelled.
#[derive(Debug, Clone, Copy)]
pub struct ParsePoller {
    interval: Duration,
    max_attempts: u32,
}

impl ParsePoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.poll_interval(), config.max_poll_attempts)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run(
        &self,
        source: &dyn DataSource,
        script_id: &str,
        cancel: &PollCancel,
        mut on_progress: impl FnMut(&ParsingStatus) + Send,
    ) -> Result<PollOutcome> {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let status = source.script_status(script_id).await?;
            debug!(
                target: "previz::poll",
                script_id,
                attempt,
                status = %status.script_status,
                "status check"
            );
            on_progress(&status);

            match status.script_status {
                ScriptStatus::Parsed if status.total_scenes > 0 => {
                    let scenes = source.get_scenes(script_id).await?;
                    info!(target: "previz::poll", script_id, scenes = scenes.len(), "script parsed");
                    return Ok(PollOutcome::Parsed { status, scenes });
                }
                ScriptStatus::Parsed => return Ok(PollOutcome::ParsedEmpty(status)),
                ScriptStatus::Failed => {
                    warn!(target: "previz::poll", script_id, "script parsing failed");
                    return Ok(PollOutcome::Failed(status));
                }
                ScriptStatus::Uploaded | ScriptStatus::Parsing => {}
            }

            if attempt == self.max_attempts {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            }
        }

        warn!(target: "previz::poll", script_id, attempts = self.max_attempts, "giving up on status polling");
        Err(ApiError::PollExhausted {
            attempts: self.max_attempts,
        })
    }
}
