//! Ethereum JSON-RPC client library
//!
//! This library talks JSON-RPC 2.0 to an Ethereum node:
//!
//! - `provider` - transports: a duplex WebSocket engine that multiplexes
//!   concurrent calls and subscriptions over one connection, and a stateless
//!   HTTP transport
//! - `jsonrpc` - envelope types and the message codec
//! - `eth` - typed helpers over the method catalogue
//! - `multicall` - batching read-only calls through a Multicall contract
//! - `models` - typed reply records
//!
//! # Example
//!
//! ```ignore
//! use ethrpc::Eth;
//!
//! let eth = Eth::connect("ws://127.0.0.1:8546").await?;
//! let block = eth.block_number().await?;
//! let balance = eth.balance_at_block("0x00000000219ab540356cbb839cbe05303d7705fa", "latest").await?;
//! eth.stop();
//! ```

pub mod config;
pub mod error;
pub mod eth;
pub mod hexutil;
pub mod jsonrpc;
pub mod methods;
pub mod models;
pub mod multicall;
pub mod provider;

pub use config::{HttpConfig, WsConfig};
pub use error::{Result, RpcError};
pub use eth::{Eth, TypedSubscription};
pub use models::ClientKind;
pub use provider::{HttpProvider, Provider, WsProvider};
pub use primitive_types::U256;
