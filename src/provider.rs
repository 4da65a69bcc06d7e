//! Transports that carry JSON-RPC calls to a node.
//!
//! Two providers implement the [`Provider`] seam:
//!
//! - [`WsProvider`] keeps one WebSocket open, multiplexes concurrent calls
//!   over it and routes subscription notifications to their consumers.
//! - [`HttpProvider`] POSTs one request per call and supports no
//!   subscriptions.
//!
//! [`from_url`] picks one by URL scheme:
//!
//! ```text
//! http://, https://  ──►  HttpProvider
//! ws://,   wss://    ──►  WsProvider (must be started before use)
//! ```

mod correlation;
mod http;
mod throttle;
mod transport;
mod ws;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{HttpConfig, WsConfig};
use crate::error::{Result, RpcError};
use crate::jsonrpc::JsonRpcResponse;

pub use correlation::NotificationSink;
pub use http::HttpProvider;
pub use throttle::LogThrottle;
pub use transport::ConnectionState;
pub use ws::WsProvider;

/// Operations every transport offers.
///
/// Object safe so the `Eth` facade can hold any transport, and tests can swap
/// in a scripted one.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Establish the connection, if the transport has one.
    async fn start(&self) -> Result<()>;

    /// Close the connection, if the transport has one.
    fn stop(&self);

    /// Send one call and return its reply envelope.
    ///
    /// `params` is the positional parameter list.
    async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse>;

    /// Subscribe and route notifications into `sink`. Returns the
    /// subscription id.
    async fn subscribe(
        &self,
        sink: NotificationSink,
        method: &str,
        event: &str,
        extra_params: Value,
    ) -> Result<String>;

    /// Close a subscription locally.
    fn unsubscribe(&self, sub_id: &str) -> bool;
}

/// Which transport a URL selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    WebSocket,
}

impl TransportKind {
    /// Select by scheme; anything but http(s)/ws(s) is refused.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url)?;
        match parsed.scheme() {
            "http" | "https" => Ok(TransportKind::Http),
            "ws" | "wss" => Ok(TransportKind::WebSocket),
            other => Err(RpcError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Build the provider a URL selects, with configuration from the environment.
///
/// A WebSocket provider is returned unstarted.
pub fn from_url(url: &str) -> Result<(TransportKind, Arc<dyn Provider>)> {
    let kind = TransportKind::from_url(url)?;
    let provider: Arc<dyn Provider> = match kind {
        TransportKind::Http => Arc::new(HttpProvider::with_config(url, HttpConfig::from_env())?),
        TransportKind::WebSocket => Arc::new(WsProvider::with_config(url, WsConfig::from_env())?),
    };
    Ok((kind, provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_selection() {
        assert_eq!(TransportKind::from_url("http://localhost:8545").unwrap(), TransportKind::Http);
        assert_eq!(TransportKind::from_url("https://node.example").unwrap(), TransportKind::Http);
        assert_eq!(TransportKind::from_url("ws://localhost:8546").unwrap(), TransportKind::WebSocket);
        assert_eq!(TransportKind::from_url("wss://node.example").unwrap(), TransportKind::WebSocket);
        assert!(matches!(
            TransportKind::from_url("ipc:///tmp/geth.ipc"),
            Err(RpcError::UnsupportedScheme(s)) if s == "ipc"
        ));
    }

    #[test]
    fn test_from_url_builds_provider() {
        let (kind, _provider) = from_url("ws://127.0.0.1:8546").unwrap();
        assert_eq!(kind, TransportKind::WebSocket);
        let (kind, _provider) = from_url("http://127.0.0.1:8545").unwrap();
        assert_eq!(kind, TransportKind::Http);
    }
}
