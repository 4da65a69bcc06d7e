//! WebSocket provider: the public face of the duplex connection.
//!
//! `WsProvider` lets many tasks share one connection. Each call gets a fresh
//! id, is registered in the correlation table, queued for the write pump,
//! and then waits for whichever comes first: its reply, the connection dying,
//! or the optional request timeout.
//!
//! # Example
//!
//! ```ignore
//! use ethrpc::provider::WsProvider;
//!
//! let provider = WsProvider::new("ws://127.0.0.1:8546")?;
//! provider.start().await?;
//!
//! let peers: String = provider.call("net_peerCount", ()).await?;
//!
//! let (sink, mut headers) = tokio::sync::mpsc::channel(100);
//! let sub_id = provider.subscribe(sink, "eth_subscribe", "newHeads", ()).await?;
//! while let Some(header) = headers.recv().await {
//!     println!("{}", header.get());
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::config::WsConfig;
use crate::error::{Result, RpcError};
use crate::jsonrpc::{encode_request, JsonRpcResponse};
use crate::provider::correlation::{CorrelationTable, NotificationSink, PendingCall};
use crate::provider::transport::{self, ConnectionState, Shared};
use crate::provider::Provider;

/// Removes a pending call when its caller stops waiting for any reason.
struct PendingGuard<'a> {
    table: &'a CorrelationTable,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.table.forget(self.id) {
            debug!("Abandoned call {}", self.id);
        }
    }
}

/// JSON-RPC client over one persistent WebSocket connection.
pub struct WsProvider {
    shared: Arc<Shared>,
    /// Monotonically increasing call id counter.
    next_id: AtomicU64,
}

impl WsProvider {
    /// Create a provider for a `ws://` or `wss://` endpoint with default
    /// settings. Nothing is dialed until [`start`](Self::start).
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, WsConfig::default())
    }

    /// Create a provider with explicit settings.
    pub fn with_config(url: &str, config: WsConfig) -> Result<Self> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(RpcError::UnsupportedScheme(other.to_string())),
        }
        Ok(Self {
            shared: Arc::new(Shared::new(url, config)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Connect (retrying if configured) and start the read and write pumps.
    ///
    /// # Errors
    ///
    /// - `RpcError::Connect` if the first attempt fails and retry is off
    /// - `RpcError::ConnectionClosed` if the provider was stopped
    pub async fn start(&self) -> Result<()> {
        transport::start(&self.shared).await
    }

    /// Tear the connection down. Returns `false` if it already was.
    pub fn stop(&self) -> bool {
        self.shared.teardown()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn config(&self) -> &WsConfig {
        &self.shared.config
    }

    /// Number of calls awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.table.pending_len()
    }

    /// Number of subscriptions currently routed to a consumer.
    pub fn subscription_count(&self) -> usize {
        self.shared.table.subscription_len()
    }

    fn next_id(&self) -> String {
        format!("{:x}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Send a call and wait for its reply envelope.
    async fn request<P: Serialize + ?Sized>(
        &self,
        method: &str,
        params: &P,
        sink: Option<NotificationSink>,
    ) -> Result<JsonRpcResponse> {
        self.shared.ensure_open()?;

        let id = self.next_id();
        let frame = encode_request(method, params, &id)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let call = match sink {
            Some(sink) => PendingCall::subscribe(reply_tx, sink),
            None => PendingCall::new(reply_tx),
        };
        self.shared.table.register(&id, call)?;
        let _guard = PendingGuard {
            table: &self.shared.table,
            id: &id,
        };

        self.shared.enqueue(frame).await?;
        self.await_reply(reply_rx).await
    }

    async fn await_reply(&self, reply_rx: oneshot::Receiver<JsonRpcResponse>) -> Result<JsonRpcResponse> {
        let wait = async {
            tokio::select! {
                // A delivered reply wins over a teardown that follows it.
                biased;
                reply = reply_rx => reply.map_err(|_| RpcError::ConnectionClosed),
                _ = self.shared.cancel.cancelled() => Err(RpcError::ConnectionClosed),
            }
        };

        match self.shared.config.request_timeout {
            Some(limit) => timeout(limit, wait)
                .await
                .map_err(|_| RpcError::Timeout(limit))?,
            None => wait.await,
        }
    }

    /// Call a method and decode its result into `R`.
    ///
    /// `params` must serialize to a JSON array (a tuple, a slice, a `Vec`) or
    /// to `null` (`()`), which sends an empty list.
    ///
    /// # Errors
    ///
    /// - `RpcError::VmExecution` / `RpcError::Remote` for an error reply
    /// - `RpcError::NullResult` when the result is `null`
    /// - `RpcError::ConnectionClosed` if the connection dies first
    pub async fn call<R, P>(&self, method: &str, params: P) -> Result<R>
    where
        R: DeserializeOwned,
        P: Serialize,
    {
        self.request(method, &params, None).await?.into_result()
    }

    /// Call a method and return the reply frame untouched.
    pub async fn call_raw<P: Serialize>(&self, method: &str, params: P) -> Result<String> {
        Ok(self.request(method, &params, None).await?.raw)
    }

    /// Subscribe to `event` through `method` (e.g. `eth_subscribe`,
    /// `newHeads`) and route its notifications into `sink`.
    ///
    /// The sink receives one raw payload per notification, in arrival order,
    /// until [`unsubscribe`](Self::unsubscribe) or connection death closes it.
    /// Returns the server-assigned subscription id.
    pub async fn subscribe<P: Serialize>(
        &self,
        sink: NotificationSink,
        method: &str,
        event: &str,
        extra_params: P,
    ) -> Result<String> {
        let params = subscribe_params(event, &extra_params)?;
        let sub_id: String = self
            .request(method, &params, Some(sink))
            .await?
            .into_result()?;
        if sub_id.is_empty() {
            return Err(RpcError::EmptyResult);
        }
        debug!("Subscribed to {} as {}", event, sub_id);
        Ok(sub_id)
    }

    /// Close a subscription locally. The consumer sees end-of-stream.
    pub fn unsubscribe(&self, sub_id: &str) -> bool {
        self.shared.table.unregister(sub_id)
    }
}

/// `[event, extra...]`; a list of extras is spliced in, `()` adds nothing.
fn subscribe_params<P: Serialize + ?Sized>(event: &str, extra: &P) -> Result<Vec<Value>> {
    let mut params = vec![Value::String(event.to_string())];
    match serde_json::to_value(extra).map_err(|e| RpcError::Encoding(e.to_string()))? {
        Value::Null => {}
        Value::Array(items) => params.extend(items),
        other => params.push(other),
    }
    Ok(params)
}

impl Drop for WsProvider {
    fn drop(&mut self) {
        // Pumps hold their own Arc; without this they would outlive us.
        self.shared.teardown();
    }
}

#[async_trait]
impl Provider for WsProvider {
    async fn start(&self) -> Result<()> {
        WsProvider::start(self).await
    }

    fn stop(&self) {
        WsProvider::stop(self);
    }

    async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse> {
        WsProvider::request(self, method, &params, None).await
    }

    async fn subscribe(
        &self,
        sink: NotificationSink,
        method: &str,
        event: &str,
        extra_params: Value,
    ) -> Result<String> {
        WsProvider::subscribe(self, sink, method, event, extra_params).await
    }

    fn unsubscribe(&self, sub_id: &str) -> bool {
        WsProvider::unsubscribe(self, sub_id)
    }
}
