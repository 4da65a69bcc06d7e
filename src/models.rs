//! Typed reply records.
//!
//! Quantities stay as the `0x`-prefixed hex strings the node sends; use
//! [`crate::hexutil`] to turn them into numbers. Every field defaults when
//! absent so that geth, parity and other clients decode into the same shapes,
//! and unknown fields are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::hexutil;

/// Block hash geth reports for transactions that are not mined yet.
pub const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Pending transactions carry `null` for their block fields.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Block header, as pushed by a `newHeads` subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockHeader {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    pub nonce: String,
    pub sha3_uncles: String,
    pub logs_bloom: String,
    pub transactions_root: String,
    pub state_root: String,
    pub receipts_root: String,
    pub miner: String,
    pub difficulty: String,
    pub extra_data: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub timestamp: String,
    pub base_fee_per_gas: Option<String>,
}

impl BlockHeader {
    /// Block number as an integer.
    pub fn number_u64(&self) -> Result<u64> {
        hexutil::parse_u64(&self.number)
    }

    /// Unix timestamp as an integer.
    pub fn timestamp_u64(&self) -> Result<u64> {
        hexutil::parse_u64(&self.timestamp)
    }
}

/// Full block with transaction objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Block {
    #[serde(flatten)]
    pub header: BlockHeader,
    pub size: String,
    pub total_difficulty: Option<String>,
    pub transactions: Vec<Transaction>,
    pub uncles: Vec<String>,
}

/// Transaction, mined or pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub hash: String,
    pub nonce: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub block_hash: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub block_number: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub transaction_index: String,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub gas_price: String,
    pub gas: String,
    pub input: String,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
}

impl Transaction {
    /// geth reports the zero hash instead of no hash for pending transactions.
    pub(crate) fn clear_zero_block_hash(&mut self) {
        if self.block_hash == ZERO_HASH {
            self.block_hash.clear();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.block_number.is_empty()
    }
}

/// Event log entry of a receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Log {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    pub transaction_hash: String,
    pub transaction_index: String,
    pub block_hash: String,
    pub log_index: String,
    pub removed: bool,
}

/// Transaction receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Receipt {
    pub transaction_hash: String,
    pub transaction_index: String,
    pub block_hash: String,
    pub block_number: String,
    pub from: String,
    pub to: Option<String>,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    pub contract_address: Option<String>,
    pub logs: Vec<Log>,
    pub logs_bloom: String,
    pub status: Option<String>,
}

impl Receipt {
    /// `status` is `0x1` for success (post-byzantium receipts only).
    pub fn succeeded(&self) -> Option<bool> {
        self.status.as_deref().map(|s| s == "0x1")
    }
}

/// parity/openethereum `trace_block` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trace {
    pub action: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub subtraces: u64,
    pub trace_address: Vec<u64>,
    #[serde(rename = "type")]
    pub trace_type: String,
    pub block_hash: String,
    pub block_number: u64,
    pub transaction_hash: Option<String>,
    pub transaction_position: Option<u64>,
}

/// `trace_replayBlockTransactions` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionReplay {
    pub output: String,
    pub state_diff: Option<serde_json::Value>,
    pub trace: Vec<Trace>,
    pub vm_trace: Option<serde_json::Value>,
    pub transaction_hash: Option<String>,
}

/// geth `txpool_content`: pool ("pending"/"queued") → sender → nonce → tx.
pub type GethTxPool = HashMap<String, HashMap<String, HashMap<String, Transaction>>>;

/// Node implementation, detected from `web3_clientVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Geth,
    Parity,
    Unknown,
}

impl ClientKind {
    /// Detect from a version string such as `Geth/v1.13.5-stable/linux-amd64/go1.21.4`.
    pub fn from_version(version: &str) -> Self {
        let version = version.to_lowercase();
        if version.starts_with(crate::methods::CLIENT_GETH) {
            ClientKind::Geth
        } else if version.starts_with(crate::methods::CLIENT_PARITY) {
            ClientKind::Parity
        } else {
            ClientKind::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::Geth => crate::methods::CLIENT_GETH,
            ClientKind::Parity => crate::methods::CLIENT_PARITY,
            ClientKind::Unknown => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_block_header_deserialization() {
        let json = r#"{
            "number": "0x1b4",
            "hash": "0xdc0818cf78f21a8e70579cb46a43643f78291264dda342ae31049421c82d21ae",
            "parentHash": "0xe99e022112df268087ea7eafaf4790497fd21dbeeb6bd7a1721df161a6657a54",
            "timestamp": "0x55ba467c",
            "gasLimit": "0x1388",
            "someFutureField": true
        }"#;

        let header: BlockHeader = serde_json::from_str(json).unwrap();
        assert_eq!(header.number_u64().unwrap(), 436);
        assert_eq!(header.timestamp_u64().unwrap(), 1438271100);
        assert_eq!(header.gas_limit, "0x1388");
        assert_eq!(header.base_fee_per_gas, None);
    }

    #[test]
    fn test_block_flattens_header() {
        let json = r#"{
            "number": "0x10",
            "hash": "0xaa",
            "transactions": [{"hash": "0x01", "from": "0xf0", "to": null, "value": "0x0"}],
            "uncles": []
        }"#;

        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block.header.number, "0x10");
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].to, None);
    }

    #[test]
    fn test_transaction_zero_hash_cleared() {
        let mut tx = Transaction {
            block_hash: ZERO_HASH.to_string(),
            ..Default::default()
        };
        tx.clear_zero_block_hash();
        assert_eq!(tx.block_hash, "");
        assert!(tx.is_pending());
    }

    #[test]
    fn test_pending_transaction_nulls() {
        let json = r#"{"hash": "0x01", "blockHash": null, "blockNumber": null, "transactionIndex": null}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.is_pending());
        assert_eq!(tx.block_hash, "");
    }

    #[test]
    fn test_receipt_status() {
        let receipt: Receipt = serde_json::from_str(r#"{"status": "0x1", "logs": []}"#).unwrap();
        assert_eq!(receipt.succeeded(), Some(true));

        let legacy: Receipt = serde_json::from_str(r#"{"root": "0xab"}"#).unwrap();
        assert_eq!(legacy.succeeded(), None);
    }

    #[test]
    fn test_geth_txpool_shape() {
        let json = r#"{
            "pending": {"0xabc": {"7": {"hash": "0x01", "nonce": "0x7"}}},
            "queued": {}
        }"#;
        let pool: GethTxPool = serde_json::from_str(json).unwrap();
        assert_eq!(pool["pending"]["0xabc"]["7"].nonce, "0x7");
    }

    #[test]
    fn test_client_kind_detection() {
        assert_eq!(
            ClientKind::from_version("Geth/v1.13.5-stable/linux-amd64/go1.21.4"),
            ClientKind::Geth
        );
        assert_eq!(
            ClientKind::from_version("Parity-Ethereum//v2.7.2-stable"),
            ClientKind::Parity
        );
        assert_eq!(ClientKind::from_version("erigon/2.48.1"), ClientKind::Unknown);
    }
}
