//! HTTP implementation of [`PlatformClient`] against the n8n REST API.
//!
//! Available behind the `http-client` feature; the rest of the crate
//! never requires the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::compile::N8nWorkflow;
use crate::error::PlatformError;
use crate::platform::{PlatformClient, WebhookResponse};

const API_SUFFIX: &str = "/api/v1";

/// Reqwest-backed n8n client.
pub struct N8nHttpClient {
    http: reqwest::Client,
    /// Instance base URL without the API suffix, e.g. `https://n8n.example.com`.
    base_url: String,
    api_key: String,
}

impl N8nHttpClient {
    /// Creates a client for the given n8n instance.
    ///
    /// `base_url` may be given with or without the `/api/v1` suffix.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, PlatformError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(PlatformError::NotConfigured(
                "n8n API key is empty".to_string(),
            ));
        }
        let base_url = base_url
            .into()
            .trim_end_matches('/')
            .trim_end_matches(API_SUFFIX)
            .to_string();
        if base_url.is_empty() {
            return Err(PlatformError::NotConfigured(
                "n8n base URL is empty".to_string(),
            ));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}{API_SUFFIX}{endpoint}", self.base_url)
    }

    /// Full webhook URL for a path; `test_mode` targets the test webhook
    /// endpoint used by inactive workflows.
    pub fn webhook_url(&self, path: &str, test_mode: bool) -> String {
        if test_mode {
            format!("{}/webhook-test/{path}", self.base_url)
        } else {
            format!("{}/webhook/{path}", self.base_url)
        }
    }

    async fn api_request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, PlatformError> {
        let url = self.api_url(endpoint);
        debug!(%method, %url, "n8n api request");

        let mut request = self
            .http
            .request(method, &url)
            .header("X-N8N-API-KEY", &self.api_key)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(PlatformError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    async fn post_webhook(
        &self,
        url: &str,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<reqwest::Response, PlatformError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| PlatformError::Request(format!("invalid HTTP method '{method}'")))?;
        let mut request = self.http.request(method.clone(), url).timeout(timeout);
        if method != Method::GET {
            request = request.json(payload);
        }
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                PlatformError::Request(e.to_string())
            }
        })
    }
}

#[async_trait]
impl PlatformClient for N8nHttpClient {
    async fn create_workflow(&self, workflow: &N8nWorkflow) -> Result<String, PlatformError> {
        let body = serde_json::to_value(workflow)
            .map_err(|e| PlatformError::Request(e.to_string()))?;
        let created = self
            .api_request(Method::POST, "/workflows", Some(&body))
            .await?;
        let id = created
            .get("id")
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .ok_or_else(|| PlatformError::Request("create response missing id".to_string()))?;
        info!(workflow = %workflow.name, %id, "workflow created");
        Ok(id)
    }

    async fn activate_workflow(&self, workflow_id: &str) -> Result<(), PlatformError> {
        self.api_request(
            Method::POST,
            &format!("/workflows/{workflow_id}/activate"),
            None,
        )
        .await?;
        info!(%workflow_id, "workflow activated");
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), PlatformError> {
        self.api_request(Method::DELETE, &format!("/workflows/{workflow_id}"), None)
            .await?;
        info!(%workflow_id, "workflow deleted");
        Ok(())
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Value, PlatformError> {
        self.api_request(Method::GET, &format!("/workflows/{workflow_id}"), None)
            .await
    }

    /// Triggers the production webhook, falling back to the test webhook
    /// when the production one is not registered (404, inactive workflow).
    async fn trigger_webhook(
        &self,
        path: &str,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<WebhookResponse, PlatformError> {
        let production_url = self.webhook_url(path, false);
        let mut response = self
            .post_webhook(&production_url, method, payload, timeout)
            .await?;

        if response.status().as_u16() == 404 {
            debug!(%path, "production webhook not found, trying test webhook");
            let test_url = self.webhook_url(path, true);
            response = self.post_webhook(&test_url, method, payload, timeout).await?;
        }

        let status_code = response.status().as_u16();
        let success = response.status().is_success();
        let body: Option<Value> = response.json().await.ok();

        Ok(WebhookResponse {
            status_code,
            body,
            success,
            error: (!success).then(|| format!("webhook returned HTTP {status_code}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client =
            N8nHttpClient::new("https://n8n.example.com/api/v1/", "key").unwrap();
        assert_eq!(client.api_url("/workflows"), "https://n8n.example.com/api/v1/workflows");
        assert_eq!(
            client.webhook_url("orders", false),
            "https://n8n.example.com/webhook/orders"
        );
        assert_eq!(
            client.webhook_url("orders", true),
            "https://n8n.example.com/webhook-test/orders"
        );
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(N8nHttpClient::new("https://n8n.example.com", "").is_err());
        assert!(N8nHttpClient::new("", "key").is_err());
    }
}
