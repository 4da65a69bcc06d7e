//! Call aggregation through a deployed Multicall contract.
//!
//! Many read-only contract calls travel in one `eth_call` to the contract's
//! `aggregate` function. ABI encoding of the individual calls and decoding of
//! the aggregate reply are left to an [`AggregateCodec`] supplied by the
//! caller; this module only builds and sends the envelope.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::eth::Eth;
use crate::hexutil;
use crate::methods;

/// Multicall contract on mainnet.
pub const MAINNET_ADDRESS: &str = "0xeefba1e63905ef1d7acba5a8513c70307c1ce441";

/// Multicall contract on Goerli.
pub const GOERLI_ADDRESS: &str = "0x77dca2c955b15e9de4dbbcf1246b4b85b651e50e";

/// Selector of `aggregate((address,bytes)[])`.
pub const AGGREGATE_METHOD: &str = "0x17352e13";

pub const DEFAULT_GAS: &str = "0x400000000";

/// Outcome of one aggregated call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallResult {
    pub success: bool,
    pub raw: Vec<u8>,
    pub decoded: Vec<Value>,
}

/// Outcome of one aggregate request, keyed by the caller's call keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MulticallResult {
    pub block_number: u64,
    pub calls: HashMap<String, CallResult>,
}

/// ABI encoding and decoding for a batch of calls.
pub trait AggregateCodec {
    /// Encoded arguments of `aggregate`, without the selector.
    fn call_data(&self) -> Result<Vec<u8>>;

    /// Decode the reply, including each call's return values.
    fn decode(&self, raw: &str) -> Result<MulticallResult>;

    /// Decode the reply, keeping each call's return data undecoded.
    fn decode_raw(&self, raw: &str) -> Result<MulticallResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticallConfig {
    pub contract_address: String,
    pub gas: String,
}

impl Default for MulticallConfig {
    fn default() -> Self {
        Self {
            contract_address: MAINNET_ADDRESS.to_string(),
            gas: DEFAULT_GAS.to_string(),
        }
    }
}

/// Aggregating client bound to one Multicall contract.
pub struct Multicall {
    eth: Arc<Eth>,
    config: MulticallConfig,
}

impl Multicall {
    /// Use the mainnet contract with the default gas limit.
    pub fn new(eth: Arc<Eth>) -> Self {
        Self {
            eth,
            config: MulticallConfig::default(),
        }
    }

    pub fn contract_address(mut self, address: &str) -> Self {
        self.config.contract_address = address.to_string();
        self
    }

    /// Gas limit as a number.
    pub fn gas(mut self, gas: u64) -> Self {
        self.config.gas = format!("0x{:x}", gas);
        self
    }

    /// Gas limit as a hex quantity, used verbatim.
    pub fn gas_hex(mut self, gas: &str) -> Self {
        self.config.gas = gas.to_string();
        self
    }

    /// Address of the configured contract.
    pub fn contract(&self) -> &str {
        &self.config.contract_address
    }

    pub fn config(&self) -> &MulticallConfig {
        &self.config
    }

    /// Run the batch at `block` and decode every call's return values.
    pub async fn call<C: AggregateCodec>(&self, calls: &C, block: &str) -> Result<MulticallResult> {
        let raw = self.send(calls, block).await?;
        calls.decode(&raw)
    }

    /// Run the batch at `block`, leaving return data undecoded.
    pub async fn call_raw<C: AggregateCodec>(&self, calls: &C, block: &str) -> Result<MulticallResult> {
        let raw = self.send(calls, block).await?;
        calls.decode_raw(&raw)
    }

    async fn send<C: AggregateCodec>(&self, calls: &C, block: &str) -> Result<String> {
        let payload = calls.call_data()?;
        let call = json!({
            "to": self.config.contract_address,
            "data": format!("{}{}", AGGREGATE_METHOD, hexutil::encode_bytes(&payload)),
            "gas": self.config.gas,
        });
        debug!("aggregate call with {} bytes of call data", payload.len());
        self.eth.send_request(methods::ETH_CALL, (call, block)).await
    }
}
