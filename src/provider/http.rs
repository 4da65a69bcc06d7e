//! Stateless HTTP provider: one POST per call, no shared state across calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{Result, RpcError};
use crate::jsonrpc::{decode_response, encode_request, JsonRpcResponse};
use crate::provider::correlation::NotificationSink;
use crate::provider::Provider;

/// JSON-RPC client over plain HTTP(S).
pub struct HttpProvider {
    url: Url,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl HttpProvider {
    /// Create a provider for an `http://` or `https://` endpoint.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, HttpConfig::default())
    }

    pub fn with_config(url: &str, config: HttpConfig) -> Result<Self> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(RpcError::UnsupportedScheme(other.to_string())),
        }
        Ok(Self {
            url,
            client: build_client(config.timeout)?,
            timeout: config.timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Replace the request timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn next_id(&self) -> String {
        format!("{:x}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn post(&self, method: &str, params: &Value) -> Result<JsonRpcResponse> {
        let id = self.next_id();
        let body = encode_request(method, params, &id)?;

        debug!("POST {} ({})", method, id);
        let text = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout(self.timeout)
                } else {
                    RpcError::from(e)
                }
            })?
            .error_for_status()?
            .text()
            .await?;

        let response = decode_response(&text)?;
        // Some nodes answer malformed requests with an error and a null id.
        if response.valid_id() == Some(id.as_str()) || response.error.is_some() {
            return Ok(response);
        }
        Err(RpcError::Protocol(format!(
            "reply id {:?} does not match request id {}",
            response.id, id
        )))
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[async_trait]
impl Provider for HttpProvider {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse> {
        self.post(method, &params).await
    }

    async fn subscribe(
        &self,
        _sink: NotificationSink,
        _method: &str,
        _event: &str,
        _extra_params: Value,
    ) -> Result<String> {
        Err(RpcError::SubscriptionsUnsupported)
    }

    fn unsubscribe(&self, _sub_id: &str) -> bool {
        false
    }
}
