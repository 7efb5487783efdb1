//! Chain access seam
//!
//! The pipeline talks to the network through the [`ChainClient`] trait:
//! account metadata queries, transaction submission, and transaction lookup.
//! Concrete implementations (gRPC, RPC, in-process test chains) live with the
//! embedding application; the pipeline only cares about the handful of calls
//! defined here.

use crate::error::WalletResult;

use async_trait::async_trait;

/// CheckTx code returned by the chain when the transaction's sequence number
/// does not match the account's expected sequence (ErrWrongSequence).
pub const CODE_SEQUENCE_MISMATCH: u32 = 32;

/// Broadcast mode for transaction submission.
///
/// The pipeline always submits in `Sync` mode: the response reflects CheckTx
/// validation, not block inclusion, and finality is discovered by the
/// confirmation tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastMode {
    Sync,
    Async,
    Block,
}

/// Opaque domain message, protobuf-`Any` style: a type URL naming the
/// handler plus the encoded message body. The pipeline never inspects the
/// body; it only packs messages into transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyMsg {
    pub type_url: String,
    pub value: Vec<u8>,
}

impl AnyMsg {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }
}

/// On-chain account metadata used for signing.
#[derive(Debug, Clone, Default)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Immediate or final response for a transaction.
///
/// `code == 0` means accepted (at CheckTx when returned from a broadcast, or
/// executed successfully when returned from a lookup); any other code is a
/// rejection described by `raw_log`.
#[derive(Debug, Clone, Default)]
pub struct TxResponse {
    pub code: u32,
    pub tx_hash: String,
    pub raw_log: String,
}

impl TxResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Sequence-mismatch rejections arrive either as the dedicated CheckTx
    /// code or, from some intermediaries, as a generic code with the
    /// mismatch only visible in the log.
    pub fn is_sequence_mismatch(&self) -> bool {
        self.code == CODE_SEQUENCE_MISMATCH
            || self.raw_log.contains("account sequence mismatch")
    }
}

/// Remote chain operations consumed by the pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch account number and current sequence for an address.
    async fn get_account(&self, address: &str) -> WalletResult<AccountInfo>;

    /// Latest committed block height.
    async fn get_latest_block_height(&self) -> WalletResult<u64>;

    /// Network chain id.
    async fn get_chain_id(&self) -> WalletResult<String>;

    /// Submit encoded transaction bytes. A transport-level failure is an
    /// `Err`; an on-chain rejection is an `Ok` response with non-zero code.
    async fn broadcast_tx(&self, tx_bytes: Vec<u8>, mode: BroadcastMode)
        -> WalletResult<TxResponse>;

    /// Look up a transaction by hash. `None` means not (yet) included.
    async fn get_tx(&self, tx_hash: &str) -> WalletResult<Option<TxResponse>>;
}
