//! `Eth` facade: typed helpers over the JSON-RPC method catalogue.
//!
//! `Eth` owns any [`Provider`] and turns method calls into typed results.
//! Subscriptions come back as [`TypedSubscription`]s that decode each pushed
//! payload on receipt.
//!
//! # Example
//!
//! ```ignore
//! use ethrpc::Eth;
//!
//! let eth = Eth::connect("ws://127.0.0.1:8546").await?;
//! println!("{} peers", eth.peer_count().await?);
//!
//! let mut heads = eth.new_heads_subscription().await?;
//! while let Some(header) = heads.recv().await {
//!     println!("block {}", header?.number);
//! }
//! ```

use std::sync::Arc;

use primitive_types::U256;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info};

use crate::config::WsConfig;
use crate::error::{Result, RpcError};
use crate::hexutil;
use crate::methods::{self, erc20};
use crate::models::{
    Block, BlockHeader, ClientKind, GethTxPool, Receipt, Trace, Transaction, TransactionReplay,
    ZERO_HASH,
};
use crate::provider::{self, NotificationSink, Provider, TransportKind};

/// Channel size for the high-volume pending transaction and block number
/// subscriptions.
pub const FIREHOSE_SUBSCRIPTION_BUFFER: usize = 10_000;

/// A subscription whose payloads are decoded into `T` as they are received.
pub struct TypedSubscription<T> {
    id: String,
    rx: mpsc::Receiver<Box<RawValue>>,
    decode: fn(&RawValue) -> Result<T>,
}

impl<T> TypedSubscription<T> {
    fn new(id: String, rx: mpsc::Receiver<Box<RawValue>>, decode: fn(&RawValue) -> Result<T>) -> Self {
        Self { id, rx, decode }
    }

    /// Server-assigned subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next notification, or `None` once the subscription is closed.
    ///
    /// A payload that fails to decode is reported as an error; the stream
    /// continues with the next one.
    pub async fn recv(&mut self) -> Option<Result<T>> {
        let raw = self.rx.recv().await?;
        Some((self.decode)(&raw))
    }

    /// Give up the decoding and take the raw receiver.
    pub fn into_inner(self) -> mpsc::Receiver<Box<RawValue>> {
        self.rx
    }
}

fn decode_json<T: DeserializeOwned>(raw: &RawValue) -> Result<T> {
    serde_json::from_str(raw.get()).map_err(|e| RpcError::Decoding {
        raw: raw.get().to_string(),
        cause: e.to_string(),
    })
}

fn decode_block_number(raw: &RawValue) -> Result<i64> {
    let number: String = decode_json(raw)?;
    hexutil::parse_i64(&number)
}

fn to_params<P: Serialize>(params: P) -> Result<Value> {
    serde_json::to_value(params).map_err(|e| RpcError::Encoding(e.to_string()))
}

/// `balanceOf(address)` call data: selector, zero padding, bare address.
fn balance_of_data(address: &str) -> String {
    let selector = erc20::BALANCE_OF;
    let padding = "0".repeat(32 - selector.len() + 2);
    format!("{}{}{}", selector, padding, address.replacen("0x", "", 1))
}

/// An empty quantity (`"0x"` or `""`) means the node had nothing to report.
fn non_empty(result: String) -> Result<String> {
    if result == "0x" || result.is_empty() {
        return Err(RpcError::EmptyResult);
    }
    Ok(result)
}

/// Ethereum node client.
pub struct Eth {
    provider: Arc<dyn Provider>,
    client: OnceCell<ClientKind>,
    subscription_buffer: usize,
}

impl Eth {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            client: OnceCell::new(),
            subscription_buffer: WsConfig::default().subscription_buffer,
        }
    }

    /// Pick the transport by URL scheme. A WebSocket endpoint is started
    /// before this returns.
    pub async fn connect(url: &str) -> Result<Self> {
        let (kind, provider) = provider::from_url(url)?;
        let mut eth = Self::new(provider);
        if kind == TransportKind::WebSocket {
            eth.subscription_buffer = WsConfig::from_env().subscription_buffer;
            eth.start().await?;
        }
        Ok(eth)
    }

    /// Channel size for [`new_heads_subscription`](Self::new_heads_subscription).
    pub fn with_subscription_buffer(mut self, size: usize) -> Self {
        self.subscription_buffer = size.max(1);
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Start the provider, then find out which client runs the node.
    pub async fn start(&self) -> Result<()> {
        self.provider.start().await?;
        let client = self.client().await?;
        info!("Connected to {:?} node", client);
        Ok(())
    }

    pub fn stop(&self) {
        self.provider.stop();
    }

    /// Send a call and decode its result into `R`.
    ///
    /// `params` serializes to the positional list; `()` sends none.
    pub async fn send_request<R, P>(&self, method: &str, params: P) -> Result<R>
    where
        R: DeserializeOwned,
        P: Serialize,
    {
        self.provider
            .request(method, to_params(params)?)
            .await?
            .into_result()
    }

    /// Send a call and return the reply frame as received.
    pub async fn send_request_raw<P: Serialize>(&self, method: &str, params: P) -> Result<String> {
        Ok(self.provider.request(method, to_params(params)?).await?.raw)
    }

    /// Subscribe to `event` and route raw payloads into `sink`.
    pub async fn subscribe<P: Serialize>(
        &self,
        sink: NotificationSink,
        method: &str,
        event: &str,
        extra_params: P,
    ) -> Result<String> {
        self.provider
            .subscribe(sink, method, event, to_params(extra_params)?)
            .await
    }

    /// Close a subscription locally; its stream ends.
    pub fn unsubscribe(&self, sub_id: &str) -> bool {
        self.provider.unsubscribe(sub_id)
    }

    async fn typed_subscription<T, P: Serialize>(
        &self,
        buffer: usize,
        method: &str,
        event: &str,
        extra_params: P,
        decode: fn(&RawValue) -> Result<T>,
    ) -> Result<TypedSubscription<T>> {
        let (sink, rx) = mpsc::channel(buffer);
        let id = self.subscribe(sink, method, event, extra_params).await?;
        debug!("{} subscription {}", event, id);
        Ok(TypedSubscription::new(id, rx, decode))
    }

    pub async fn latest_block(&self) -> Result<Block> {
        self.send_request(methods::ETH_GET_BLOCK_BY_NUMBER, (methods::LATEST, true))
            .await
    }

    /// Block with its full transaction list.
    pub async fn block_by_number(&self, number: &str) -> Result<Block> {
        self.send_request(methods::ETH_GET_BLOCK_BY_NUMBER, (number, true))
            .await
    }

    pub async fn block_transaction_count_by_number(&self, number: &str) -> Result<String> {
        self.send_request(methods::ETH_GET_BLOCK_TRANSACTION_COUNT_BY_NUMBER, (number,))
            .await
    }

    pub async fn uncle_by_block_hash_and_index(&self, hash: &str, index: &str) -> Result<Block> {
        self.send_request(methods::ETH_GET_UNCLE_BY_BLOCK_HASH_AND_INDEX, (hash, index))
            .await
    }

    pub async fn uncle_by_block_number_and_index(&self, number: &str, index: &str) -> Result<Block> {
        self.send_request(methods::ETH_GET_UNCLE_BY_BLOCK_NUMBER_AND_INDEX, (number, index))
            .await
    }

    pub async fn peer_count(&self) -> Result<i64> {
        let peers: String = self.send_request(methods::NET_PEER_COUNT, ()).await?;
        hexutil::parse_i64(&peers)
    }

    /// Raw `web3_clientVersion` string.
    pub async fn version(&self) -> Result<String> {
        self.send_request(methods::WEB3_CLIENT_VERSION, ()).await
    }

    /// Node implementation. Detected once, then cached.
    pub async fn client(&self) -> Result<ClientKind> {
        self.client
            .get_or_try_init(|| async {
                let version = self.version().await?;
                Ok::<_, RpcError>(ClientKind::from_version(&version))
            })
            .await
            .copied()
    }

    /// Install a pending transaction filter; returns the filter id.
    pub async fn set_pending_transactions_filter(&self) -> Result<String> {
        self.send_request(methods::ETH_NEW_PENDING_TRANSACTION_FILTER, ())
            .await
    }

    pub async fn filter_changes(&self, filter_id: &str) -> Result<Vec<Value>> {
        self.send_request(methods::ETH_GET_FILTER_CHANGES, (filter_id,))
            .await
    }

    /// Transaction hashes seen by a pending transaction filter since the last poll.
    pub async fn pending_filter_changes(&self, filter_id: &str) -> Result<Vec<String>> {
        self.send_request(methods::ETH_GET_FILTER_CHANGES, (filter_id,))
            .await
    }

    /// Full pending transaction list. parity has a dedicated call, geth
    /// exposes its transaction pool; other clients yield nothing.
    pub async fn pending_transactions(&self) -> Result<Vec<Transaction>> {
        match self.client().await? {
            ClientKind::Parity => {
                self.send_request(methods::PARITY_PENDING_TRANSACTIONS, ())
                    .await
            }
            ClientKind::Geth => {
                let pool: GethTxPool = self.send_request(methods::GETH_TXPOOL_CONTENT, ()).await?;
                let txs = pool
                    .into_values()
                    .flat_map(|senders| senders.into_values())
                    .flat_map(|by_nonce| by_nonce.into_values())
                    .map(|mut tx| {
                        tx.clear_zero_block_hash();
                        tx
                    })
                    .collect();
                Ok(txs)
            }
            ClientKind::Unknown => Ok(Vec::new()),
        }
    }

    pub async fn transaction_by_hash(&self, hash: &str) -> Result<Transaction> {
        let mut tx: Transaction = self
            .send_request(methods::ETH_GET_TRANSACTION_BY_HASH, (hash,))
            .await?;
        // geth reports the zero hash for transactions not yet in a block
        if tx.block_number.is_empty() && tx.block_hash == ZERO_HASH {
            tx.block_hash.clear();
        }
        Ok(tx)
    }

    pub async fn transaction_receipt(&self, hash: &str) -> Result<Receipt> {
        self.send_request(methods::ETH_GET_TRANSACTION_RECEIPT, (hash,))
            .await
    }

    /// Balance of `address` at `block` as the node's hex quantity.
    pub async fn raw_balance_at_block(&self, address: &str, block: &str) -> Result<String> {
        let result: String = self
            .send_request(methods::ETH_GET_BALANCE, (address, block))
            .await?;
        non_empty(result)
    }

    /// Balance of `address` at `block` in wei.
    pub async fn balance_at_block(&self, address: &str, block: &str) -> Result<U256> {
        let raw = self.raw_balance_at_block(address, block).await?;
        hexutil::parse_u256(&raw)
    }

    /// ERC-20 `balanceOf(address)` on `token` at `block`, as returned.
    pub async fn raw_token_balance_at_block(
        &self,
        address: &str,
        token: &str,
        block: &str,
    ) -> Result<String> {
        let call = json!({
            "to": token,
            "data": balance_of_data(address),
        });
        let result: String = self.send_request(methods::ETH_CALL, (call, block)).await?;
        non_empty(result)
    }

    pub async fn token_balance_at_block(&self, address: &str, token: &str, block: &str) -> Result<U256> {
        let raw = self.raw_token_balance_at_block(address, token, block).await?;
        hexutil::parse_u256(&raw)
    }

    /// Number of the most recent block.
    pub async fn block_number(&self) -> Result<i64> {
        let number: String = self.send_request(methods::ETH_BLOCK_NUMBER, ()).await?;
        hexutil::parse_i64(&number)
    }

    /// ABI-encoded result of the token's `name()`.
    pub async fn contract_name(&self, address: &str) -> Result<String> {
        self.call_contract_function(erc20::NAME, address, methods::DEFAULT_CALL_GAS)
            .await
    }

    /// ABI-encoded result of the token's `symbol()`.
    pub async fn contract_symbol(&self, address: &str) -> Result<String> {
        self.call_contract_function(erc20::SYMBOL, address, methods::DEFAULT_CALL_GAS)
            .await
    }

    pub async fn contract_total_supply(&self, address: &str) -> Result<U256> {
        self.call_contract_function_u256(erc20::TOTAL_SUPPLY, address)
            .await
    }

    /// The token's `decimals()`. Anything that is not a uint8 is
    /// [`RpcError::InvalidUInt8`].
    pub async fn erc20_decimals(&self, address: &str) -> Result<u8> {
        let decimals = match self
            .call_contract_function_i64(erc20::DECIMALS, address)
            .await
        {
            Ok(d) => d,
            Err(RpcError::InvalidHex(_)) => return Err(RpcError::InvalidUInt8),
            Err(e) => return Err(e),
        };
        u8::try_from(decimals).map_err(|_| RpcError::InvalidUInt8)
    }

    /// Contract bytecode at the latest block.
    pub async fn code(&self, address: &str) -> Result<Vec<u8>> {
        let code: String = self
            .send_request(methods::ETH_GET_CODE, (address, methods::LATEST))
            .await?;
        hexutil::decode_bytes(&code)
    }

    pub async fn trace_block(&self, block: &str) -> Result<Vec<Trace>> {
        self.send_request(methods::TRACE_BLOCK, (block,)).await
    }

    /// Replay every transaction of `block` with the given trace types
    /// (`trace`, `vmTrace`, `stateDiff`).
    pub async fn trace_replay_block_transactions(
        &self,
        block: &str,
        trace_types: &[&str],
    ) -> Result<Vec<TransactionReplay>> {
        self.send_request(methods::TRACE_REPLAY_BLOCK_TRANSACTIONS, (block, trace_types))
            .await
    }

    /// `eth_subscribe` to `newHeads`.
    pub async fn new_heads_subscription(&self) -> Result<TypedSubscription<BlockHeader>> {
        self.typed_subscription(
            self.subscription_buffer,
            methods::ETH_SUBSCRIBE,
            methods::NEW_HEADS,
            (),
            decode_json::<BlockHeader>,
        )
        .await
    }

    /// `eth_subscribe` to `newPendingTransactions`; yields transaction hashes.
    pub async fn new_pending_transactions_subscription(&self) -> Result<TypedSubscription<String>> {
        self.typed_subscription(
            FIREHOSE_SUBSCRIPTION_BUFFER,
            methods::ETH_SUBSCRIBE,
            methods::NEW_PENDING_TRANSACTIONS,
            (),
            decode_json::<String>,
        )
        .await
    }

    /// parity only: `parity_subscribe` to `eth_blockNumber`.
    pub async fn new_block_number_subscription(&self) -> Result<TypedSubscription<i64>> {
        let no_args: [Value; 0] = [];
        self.typed_subscription(
            FIREHOSE_SUBSCRIPTION_BUFFER,
            methods::PARITY_SUBSCRIBE,
            methods::ETH_BLOCK_NUMBER,
            (no_args,),
            decode_block_number,
        )
        .await
    }

    /// `eth_call` of `function` (a selector plus encoded arguments) on
    /// `address` at the latest block. An empty `"0x"` reply is
    /// [`RpcError::EmptyResult`].
    pub async fn call_contract_function(&self, function: &str, address: &str, gas: &str) -> Result<String> {
        let call = json!({
            "to": address,
            "data": function,
            "gas": gas,
        });
        let result: String = self
            .send_request(methods::ETH_CALL, (call, methods::LATEST))
            .await?;
        if result == "0x" {
            return Err(RpcError::EmptyResult);
        }
        Ok(result)
    }

    pub async fn call_contract_function_i64(&self, function: &str, address: &str) -> Result<i64> {
        let result = self
            .call_contract_function(function, address, methods::DEFAULT_CALL_GAS)
            .await?;
        hexutil::parse_i64(&result)
    }

    pub async fn call_contract_function_u256(&self, function: &str, address: &str) -> Result<U256> {
        let result = self
            .call_contract_function(function, address, methods::DEFAULT_CALL_GAS)
            .await?;
        hexutil::parse_u256(&result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::jsonrpc::{decode_response, JsonRpcResponse};

    /// Provider double answering from a method → result table and recording
    /// every call it sees.
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        results: Mutex<HashMap<String, String>>,
        errors: Mutex<HashMap<String, String>>,
        pub(crate) calls: Mutex<Vec<(String, Value)>>,
        pub(crate) sinks: Mutex<Vec<NotificationSink>>,
        started: Mutex<bool>,
    }

    impl ScriptedProvider {
        pub(crate) fn with(results: &[(&str, &str)]) -> Arc<Self> {
            let provider = Self::default();
            {
                let mut table = provider.results.lock().unwrap();
                for (method, result) in results {
                    table.insert(method.to_string(), result.to_string());
                }
            }
            Arc::new(provider)
        }

        pub(crate) fn fail(&self, method: &str, error: &str) {
            self.errors
                .lock()
                .unwrap()
                .insert(method.to_string(), error.to_string());
        }

        pub(crate) fn last_call(&self) -> (String, Value) {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn start(&self) -> Result<()> {
            *self.started.lock().unwrap() = true;
            Ok(())
        }

        fn stop(&self) {
            *self.started.lock().unwrap() = false;
        }

        async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            if let Some(error) = self.errors.lock().unwrap().get(method) {
                return decode_response(&format!(r#"{{"jsonrpc":"2.0","id":"1","error":{}}}"#, error));
            }
            let result = self
                .results
                .lock()
                .unwrap()
                .get(method)
                .cloned()
                .unwrap_or_else(|| "null".to_string());
            decode_response(&format!(r#"{{"jsonrpc":"2.0","id":"1","result":{}}}"#, result))
        }

        async fn subscribe(
            &self,
            sink: NotificationSink,
            method: &str,
            event: &str,
            extra_params: Value,
        ) -> Result<String> {
            let mut params = vec![json!(event)];
            if let Value::Array(extra) = extra_params {
                params.extend(extra);
            }
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), Value::Array(params)));
            self.sinks.lock().unwrap().push(sink);
            Ok("0xsub1".to_string())
        }

        fn unsubscribe(&self, _sub_id: &str) -> bool {
            self.sinks.lock().unwrap().pop().is_some()
        }
    }

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_peer_count() {
        let provider = ScriptedProvider::with(&[("net_peerCount", r#""0x1a""#)]);
        let eth = Eth::new(provider.clone());
        assert_eq!(eth.peer_count().await.unwrap(), 26);
        assert_eq!(provider.last_call(), ("net_peerCount".to_string(), json!(null)));
    }

    #[tokio::test]
    async fn test_empty_balance() {
        let provider = ScriptedProvider::with(&[("eth_getBalance", r#""0x""#)]);
        let eth = Eth::new(provider.clone());
        let err = eth.balance_at_block("0xabc", "latest").await.unwrap_err();
        assert!(matches!(err, RpcError::EmptyResult));
        assert_eq!(
            provider.last_call(),
            ("eth_getBalance".to_string(), json!(["0xabc", "latest"]))
        );
    }

    #[tokio::test]
    async fn test_balance_parsed() {
        let provider = ScriptedProvider::with(&[("eth_getBalance", r#""0x1bc16d674ec80000""#)]);
        let eth = Eth::new(provider);
        assert_eq!(
            eth.balance_at_block("0xabc", "0x10").await.unwrap(),
            U256::from(2_000_000_000_000_000_000u128)
        );
    }

    #[tokio::test]
    async fn test_total_supply_full_word() {
        let word = format!(r#""0x{}""#, "f".repeat(64));
        let provider = ScriptedProvider::with(&[("eth_call", word.as_str())]);
        let eth = Eth::new(provider);
        assert_eq!(eth.contract_total_supply("0xtoken").await.unwrap(), U256::MAX);
    }

    #[tokio::test]
    async fn test_token_balance_call_data() {
        let provider = ScriptedProvider::with(&[("eth_call", r#""0x0000000000000000000000000000000000000000000000000000000000000064""#)]);
        let eth = Eth::new(provider.clone());
        let balance = eth
            .token_balance_at_block("0x00000000000000000000000000000000deadbeef", "0xtoken", "latest")
            .await
            .unwrap();
        assert_eq!(balance, U256::from(100u64));

        let (method, params) = provider.last_call();
        assert_eq!(method, "eth_call");
        assert_eq!(
            params,
            json!([
                {
                    "to": "0xtoken",
                    "data": format!("0x70a08231{}deadbeef", "0".repeat(56)),
                },
                "latest"
            ])
        );
    }

    #[test]
    fn test_balance_of_padding() {
        let data = balance_of_data("0xab");
        assert_eq!(data, format!("0x70a08231{}ab", "0".repeat(24)));
    }

    #[tokio::test]
    async fn test_null_result_is_an_error() {
        let provider = ScriptedProvider::with(&[]);
        let eth = Eth::new(provider);
        let err = eth.transaction_receipt("0xfeed").await.unwrap_err();
        assert!(matches!(err, RpcError::NullResult));
    }

    #[tokio::test]
    async fn test_vm_execution_error() {
        let provider = ScriptedProvider::with(&[]);
        provider.fail(
            "eth_call",
            r#"{"code":-32015,"message":"VM execution error.","data":"Reverted 0x"}"#,
        );
        let eth = Eth::new(provider);
        let err = eth.contract_name("0xtoken").await.unwrap_err();
        match err {
            RpcError::VmExecution { code, details } => {
                assert_eq!(code, -32015);
                assert_eq!(details, "Reverted 0x");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_contract_call_empty() {
        let provider = ScriptedProvider::with(&[("eth_call", r#""0x""#)]);
        let eth = Eth::new(provider.clone());
        let err = eth.contract_symbol("0xtoken").await.unwrap_err();
        assert!(matches!(err, RpcError::EmptyResult));
        assert_eq!(
            provider.last_call().1,
            json!([{"to": "0xtoken", "data": "0x95d89b41", "gas": "0xffffff"}, "latest"])
        );
    }

    #[tokio::test]
    async fn test_erc20_decimals() {
        let provider = ScriptedProvider::with(&[("eth_call", r#""0x0000000000000000000000000000000000000000000000000000000000000012""#)]);
        let eth = Eth::new(provider);
        assert_eq!(eth.erc20_decimals("0xtoken").await.unwrap(), 18);

        let provider = ScriptedProvider::with(&[("eth_call", r#""0x100""#)]);
        let eth = Eth::new(provider);
        assert!(matches!(
            eth.erc20_decimals("0xtoken").await.unwrap_err(),
            RpcError::InvalidUInt8
        ));

        // does not fit an i64 either
        let provider = ScriptedProvider::with(&[("eth_call", r#""0xffffffffffffffffffffffffffffffff""#)]);
        let eth = Eth::new(provider);
        assert!(matches!(
            eth.erc20_decimals("0xtoken").await.unwrap_err(),
            RpcError::InvalidUInt8
        ));
    }

    #[tokio::test]
    async fn test_code_decoded() {
        let provider = ScriptedProvider::with(&[("eth_getCode", r#""0x6060""#)]);
        let eth = Eth::new(provider);
        assert_eq!(eth.code("0xc0de").await.unwrap(), vec![0x60, 0x60]);
    }

    #[tokio::test]
    async fn test_client_detection_cached() {
        let provider = ScriptedProvider::with(&[(
            "web3_clientVersion",
            r#""Geth/v1.13.5-stable/linux-amd64/go1.21.4""#,
        )]);
        let eth = Eth::new(provider.clone());
        eth.start().await.unwrap();
        assert_eq!(eth.client().await.unwrap(), ClientKind::Geth);
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_geth_pending_transactions() {
        let pool = format!(
            r#"{{"pending": {{"0xabc": {{"1": {{"hash": "0x01", "blockHash": "{}"}}}}}}, "queued": {{"0xdef": {{"4": {{"hash": "0x02"}}}}}}}}"#,
            ZERO_HASH
        );
        let provider = ScriptedProvider::with(&[
            ("web3_clientVersion", r#""Geth/v1.13.5""#),
            ("txpool_content", pool.as_str()),
        ]);
        let eth = Eth::new(provider);
        let mut txs = eth.pending_transactions().await.unwrap();
        txs.sort_by(|a, b| a.hash.cmp(&b.hash));
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].hash, "0x01");
        assert_eq!(txs[0].block_hash, "");
    }

    #[tokio::test]
    async fn test_parity_pending_transactions() {
        let provider = ScriptedProvider::with(&[
            ("web3_clientVersion", r#""Parity-Ethereum//v2.7.2""#),
            ("parity_pendingTransactions", r#"[{"hash": "0x09"}]"#),
        ]);
        let eth = Eth::new(provider);
        let txs = eth.pending_transactions().await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].hash, "0x09");
    }

    #[tokio::test]
    async fn test_transaction_by_hash_geth_correction() {
        let tx = format!(r#"{{"hash": "0x01", "blockHash": "{}", "blockNumber": null}}"#, ZERO_HASH);
        let provider = ScriptedProvider::with(&[("eth_getTransactionByHash", tx.as_str())]);
        let eth = Eth::new(provider);
        let tx = eth.transaction_by_hash("0x01").await.unwrap();
        assert_eq!(tx.block_hash, "");
        assert!(tx.is_pending());

        let mined = r#"{"hash": "0x02", "blockHash": "0xbb", "blockNumber": "0x10"}"#;
        let provider = ScriptedProvider::with(&[("eth_getTransactionByHash", mined)]);
        let eth = Eth::new(provider);
        let tx = eth.transaction_by_hash("0x02").await.unwrap();
        assert_eq!(tx.block_hash, "0xbb");
    }

    #[tokio::test]
    async fn test_trace_replay_params() {
        let provider = ScriptedProvider::with(&[(
            "trace_replayBlockTransactions",
            r#"[{"output": "0x", "trace": [], "transactionHash": "0x01"}]"#,
        )]);
        let eth = Eth::new(provider.clone());
        let replays = eth
            .trace_replay_block_transactions("0x10", &["trace", "stateDiff"])
            .await
            .unwrap();
        assert_eq!(replays[0].transaction_hash.as_deref(), Some("0x01"));
        assert_eq!(provider.last_call().1, json!(["0x10", ["trace", "stateDiff"]]));
    }

    #[tokio::test]
    async fn test_new_heads_subscription_decodes() {
        let provider = ScriptedProvider::with(&[]);
        let eth = Eth::new(provider.clone());
        let mut heads = eth.new_heads_subscription().await.unwrap();
        assert_eq!(heads.id(), "0xsub1");
        assert_eq!(
            provider.last_call(),
            ("eth_subscribe".to_string(), json!(["newHeads"]))
        );

        let sink = provider.sinks.lock().unwrap()[0].clone();
        sink.send(raw(r#"{"number": "0x10", "hash": "0xaa"}"#)).await.unwrap();
        sink.send(raw(r#"[1, 2]"#)).await.unwrap();
        drop(sink);
        provider.sinks.lock().unwrap().clear();

        let header = heads.recv().await.unwrap().unwrap();
        assert_eq!(header.number_u64().unwrap(), 16);
        assert!(matches!(heads.recv().await, Some(Err(RpcError::Decoding { .. }))));
        assert!(heads.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_block_number_subscription() {
        let provider = ScriptedProvider::with(&[]);
        let eth = Eth::new(provider.clone());
        let mut numbers = eth.new_block_number_subscription().await.unwrap();
        assert_eq!(
            provider.last_call(),
            ("parity_subscribe".to_string(), json!(["eth_blockNumber", []]))
        );

        let sink = provider.sinks.lock().unwrap()[0].clone();
        sink.send(raw(r#""0x1b4""#)).await.unwrap();
        assert_eq!(numbers.recv().await.unwrap().unwrap(), 436);
    }
}
