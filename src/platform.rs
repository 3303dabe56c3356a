//! The boundary to the automation platform.
//!
//! Everything that touches the network lives behind [`PlatformClient`], so
//! the compiler, harness, and iteration driver stay testable with in-memory
//! stubs. The trait models the handful of n8n REST operations the engine
//! needs plus webhook triggering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::compile::N8nWorkflow;
use crate::error::PlatformError;

/// Response of a webhook trigger call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Async client for the automation platform.
///
/// `get_workflow` is the only idempotent read and the only operation
/// eligible for [`retry_idempotent`]; mutations are never auto-retried.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Creates the workflow and returns its platform id.
    async fn create_workflow(&self, workflow: &N8nWorkflow) -> Result<String, PlatformError>;

    async fn activate_workflow(&self, workflow_id: &str) -> Result<(), PlatformError>;

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), PlatformError>;

    async fn get_workflow(&self, workflow_id: &str) -> Result<Value, PlatformError>;

    async fn trigger_webhook(
        &self,
        path: &str,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<WebhookResponse, PlatformError>;
}

/// Serializes pushes per platform workflow id.
///
/// Two pushes for different workflows run concurrently; two pushes for the
/// same workflow never do.
#[derive(Default)]
pub struct PushSerializer {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PushSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock guarding the given workflow id. Hold the guard for
    /// the duration of the push.
    pub async fn lock_for(&self, workflow_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(workflow_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Retries an idempotent read with bounded exponential backoff: 3 attempts,
/// 500 ms base delay, doubling per attempt.
pub async fn retry_idempotent<T, F, Fut>(mut operation: F) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut delay_ms = RETRY_BASE_DELAY_MS;
    let mut last_error = None;

    for attempt in 1..=RETRY_ATTEMPTS {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, error = %err, "idempotent read failed");
                last_error = Some(err);
                if attempt < RETRY_ATTEMPTS {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PlatformError::Request("retry exhausted".to_string())))
}
