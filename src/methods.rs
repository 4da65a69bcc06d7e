//! JSON-RPC method names, pubsub topics and well-known ERC-20 selectors.

// parity
pub const PARITY_SUBSCRIBE: &str = "parity_subscribe";
pub const PARITY_PENDING_TRANSACTIONS: &str = "parity_pendingTransactions";

// geth
pub const GETH_TXPOOL_CONTENT: &str = "txpool_content";

pub const NET_PEER_COUNT: &str = "net_peerCount";
pub const WEB3_CLIENT_VERSION: &str = "web3_clientVersion";

pub const ETH_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const ETH_CALL: &str = "eth_call";
pub const ETH_GET_BALANCE: &str = "eth_getBalance";
pub const ETH_GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";
pub const ETH_GET_BLOCK_TRANSACTION_COUNT_BY_NUMBER: &str = "eth_getBlockTransactionCountByNumber";
pub const ETH_GET_CODE: &str = "eth_getCode";
pub const ETH_GET_FILTER_CHANGES: &str = "eth_getFilterChanges";
pub const ETH_GET_TRANSACTION_BY_HASH: &str = "eth_getTransactionByHash";
pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
pub const ETH_GET_UNCLE_BY_BLOCK_HASH_AND_INDEX: &str = "eth_getUncleByBlockHashAndIndex";
pub const ETH_GET_UNCLE_BY_BLOCK_NUMBER_AND_INDEX: &str = "eth_getUncleByBlockNumberAndIndex";
pub const ETH_NEW_PENDING_TRANSACTION_FILTER: &str = "eth_newPendingTransactionFilter";
pub const ETH_SUBSCRIBE: &str = "eth_subscribe";

pub const TRACE_BLOCK: &str = "trace_block";
pub const TRACE_REPLAY_BLOCK_TRANSACTIONS: &str = "trace_replayBlockTransactions";

/// `eth_subscribe` topics.
pub const NEW_HEADS: &str = "newHeads";
pub const NEW_PENDING_TRANSACTIONS: &str = "newPendingTransactions";

/// Lowercase prefixes of `web3_clientVersion`.
pub const CLIENT_GETH: &str = "geth";
pub const CLIENT_PARITY: &str = "parity";

/// Block tag for the most recent block.
pub const LATEST: &str = "latest";

/// Gas limit sent with read-only contract calls.
pub const DEFAULT_CALL_GAS: &str = "0xffffff";

/// ERC-20 function selectors.
pub mod erc20 {
    pub const NAME: &str = "0x06fdde03";
    pub const APPROVE: &str = "0x095ea7b3";
    pub const TOTAL_SUPPLY: &str = "0x18160ddd";
    pub const TRANSFER_FROM: &str = "0x23b872dd";
    pub const DECIMALS: &str = "0x313ce567";
    pub const ISSUE_TOKENS: &str = "0x475a9fa9";
    pub const BALANCE_OF: &str = "0x70a08231";
    pub const SYMBOL: &str = "0x95d89b41";
    pub const TRANSFER: &str = "0xa9059cbb";
    pub const ALLOWANCE: &str = "0xdd62ed3e";

    // event topic prefixes
    pub const TRANSFER_EVENT: &str = "0xddf252ad";
    pub const APPROVAL_EVENT: &str = "0x8c5be1e5";
}
