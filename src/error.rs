//! Error types for the JSON-RPC client.
//!
//! Every failure a caller can observe is a variant of [`RpcError`]. Callers
//! match on the variant instead of comparing against shared error values.

use std::time::Duration;

use thiserror::Error;

/// JSON-RPC error code parity/openethereum uses for a failed VM execution.
pub const VM_EXECUTION_ERROR_CODE: i64 = -32015;

/// Convenience alias used throughout the crate.
pub type Result<T, E = RpcError> = std::result::Result<T, E>;

/// Client-side error types.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The duplex connection is dead (torn down, or died mid-call).
    #[error("Connection closed")]
    ConnectionClosed,

    /// The provider was used before `start()` established a connection.
    #[error("Provider not started")]
    NotStarted,

    /// Failed to establish the connection.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Read or write failure on an established connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request parameters could not be serialized.
    #[error("Failed to encode request: {0}")]
    Encoding(String),

    /// An incoming frame was not a valid envelope.
    #[error("Failed to decode {raw}: {cause}")]
    Decoding {
        /// The frame as received
        raw: String,
        /// Parser message
        cause: String,
    },

    /// A reply was well-formed JSON but violated the envelope contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server returned a JSON-RPC error object.
    #[error("Server error {code}: {message}")]
    Remote {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
        /// Optional additional data
        data: Option<serde_json::Value>,
    },

    /// Server reported a VM execution error (code -32015).
    #[error("VM execution error {details}")]
    VmExecution {
        /// JSON-RPC error code
        code: i64,
        /// The server's detail string, verbatim
        details: String,
    },

    /// The reply's result was the JSON `null` literal.
    #[error("Result is null")]
    NullResult,

    /// The reply decoded to an empty value where one was required.
    #[error("Result is empty")]
    EmptyResult,

    /// The reply did not fit in a `u8`.
    #[error("Result is not a valid uint8")]
    InvalidUInt8,

    /// A hex quantity could not be parsed.
    #[error("Invalid hex value: {0}")]
    InvalidHex(String),

    /// No reply arrived within the configured request timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A call id was registered twice.
    #[error("Duplicate call id: {0}")]
    DuplicateId(String),

    /// The endpoint URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The endpoint URL scheme selects no transport.
    #[error("Protocol not recognized, use http(s) or ws(s): {0}")]
    UnsupportedScheme(String),

    /// Subscriptions require the duplex transport.
    #[error("Subscriptions are not supported over HTTP")]
    SubscriptionsUnsupported,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl RpcError {
    /// Whether this error means the connection is gone for good.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, RpcError::ConnectionClosed)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RpcError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => RpcError::ConnectionClosed,
            other => RpcError::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Http(err.to_string())
    }
}

impl From<url::ParseError> for RpcError {
    fn from(err: url::ParseError) -> Self {
        RpcError::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let timeout_err = RpcError::Timeout(Duration::from_secs(30));
        assert_eq!(timeout_err.to_string(), "Request timed out after 30s");

        let server_err = RpcError::Remote {
            code: -32000,
            message: "header not found".to_string(),
            data: None,
        };
        assert_eq!(server_err.to_string(), "Server error -32000: header not found");

        let vm_err = RpcError::VmExecution {
            code: VM_EXECUTION_ERROR_CODE,
            details: "Reverted".to_string(),
        };
        assert_eq!(vm_err.to_string(), "VM execution error Reverted");

        assert_eq!(RpcError::NullResult.to_string(), "Result is null");
        assert_eq!(RpcError::EmptyResult.to_string(), "Result is empty");
    }

    #[test]
    fn test_rpc_error_from_tungstenite() {
        use tokio_tungstenite::tungstenite::Error as WsError;

        let closed: RpcError = WsError::ConnectionClosed.into();
        assert!(closed.is_connection_closed());

        let already: RpcError = WsError::AlreadyClosed.into();
        assert!(already.is_connection_closed());

        let io = WsError::Io(std::io::Error::new(std::io::ErrorKind::Other, "reset"));
        let rpc: RpcError = io.into();
        assert!(matches!(rpc, RpcError::Transport(_)));
    }

    #[test]
    fn test_rpc_error_from_url() {
        let err: RpcError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, RpcError::InvalidUrl(_)));
    }
}
