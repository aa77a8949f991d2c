//! Focus time reporting to the external Task Service.
//!
//! Engines never call the network themselves: a completed focus interval or
//! ended session yields a [`FocusReport`] and the embedding layer hands it to
//! [`FocusTimeReporter::deliver`]. The report token makes delivery
//! at-most-once per logical completion event; transient failures are retried
//! with bounded exponential backoff. A failed delivery never affects the
//! engines' local bookkeeping.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::error::ReporterError;

/// One focus-duration credit for a task. Minted once per completion event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusReport {
    /// At-most-once delivery token.
    pub token: Uuid,
    pub task_id: String,
    pub duration_secs: u64,
}

impl FocusReport {
    pub fn new(task_id: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            token: Uuid::new_v4(),
            task_id: task_id.into(),
            duration_secs,
        }
    }
}

/// HTTP client for the two Task Service endpoints the engine calls.
#[derive(Debug, Clone)]
pub struct TaskServiceClient {
    http: Client,
    base_url: Url,
}

impl TaskServiceClient {
    /// Create a client for the given Task Service base URL.
    ///
    /// # Errors
    /// Returns an error if the base URL cannot be parsed.
    pub fn new(base_url: &str) -> Result<Self, ReporterError> {
        // A trailing slash keeps Url::join from eating the last path segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(&normalized)?,
        })
    }

    /// `PATCH /tasks/{id}/focus-time` -- add to the task's cumulative focus
    /// time.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    pub async fn add_focus_time(
        &self,
        task_id: &str,
        duration_secs: u64,
    ) -> Result<(), ReporterError> {
        let url = self.base_url.join(&format!("tasks/{task_id}/focus-time"))?;
        let resp = self
            .http
            .patch(url)
            .json(&json!({ "duration": duration_secs }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ReporterError::UnexpectedStatus {
                operation: format!("focus-time update for task {task_id}"),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    /// `PATCH /tasks/{id} { status: "done" }` -- mark a (sub)task done.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status.
    pub async fn mark_done(&self, task_id: &str) -> Result<(), ReporterError> {
        let url = self.base_url.join(&format!("tasks/{task_id}"))?;
        let resp = self
            .http
            .patch(url)
            .json(&json!({ "status": "done" }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ReporterError::UnexpectedStatus {
                operation: format!("status update for task {task_id}"),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Retry policy for report delivery.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// At-most-once, retrying delivery of focus reports.
pub struct FocusTimeReporter {
    client: TaskServiceClient,
    policy: RetryPolicy,
    delivered: HashSet<Uuid>,
}

impl FocusTimeReporter {
    pub fn new(client: TaskServiceClient) -> Self {
        Self::with_policy(client, RetryPolicy::default())
    }

    pub fn with_policy(client: TaskServiceClient, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            delivered: HashSet::new(),
        }
    }

    /// Deliver a report. Returns `Ok(false)` if its token was already
    /// delivered, `Ok(true)` on a successful send.
    ///
    /// # Errors
    /// Returns the last error once all attempts are exhausted; the token
    /// stays undelivered so a later call may try again.
    pub async fn deliver(&mut self, report: &FocusReport) -> Result<bool, ReporterError> {
        if self.delivered.contains(&report.token) {
            return Ok(false);
        }
        let mut backoff = self.policy.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .client
                .add_focus_time(&report.task_id, report.duration_secs)
                .await
            {
                Ok(()) => {
                    self.delivered.insert(report.token);
                    return Ok(true);
                }
                Err(_) if attempt < self.policy.max_attempts => {
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn client(&self) -> &TaskServiceClient {
        &self.client
    }
}
