//! Transaction assembly and signing
//!
//! Turns a drained batch of messages plus a reserved sequence number into a
//! signed, wire-encoded envelope. The cryptographic material never enters
//! this crate: signing and encoding are delegated to a caller-supplied
//! [`TxSigner`].

use crate::chain::{AnyMsg, ChainClient};
use crate::error::{WalletError, WalletResult};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Signing and wire-encoding capability supplied by the embedding
/// application. Implementations hold the private key; the pipeline only ever
/// sees signatures and encoded bytes.
pub trait TxSigner: Send + Sync {
    /// Bech32 (or equivalent) account address of the signing key.
    fn address(&self) -> String;

    /// Produce the signature for an envelope (signature field unset).
    fn sign(&self, envelope: &TxEnvelope) -> WalletResult<Vec<u8>>;

    /// Encode a fully signed envelope into broadcastable bytes.
    fn encode(&self, envelope: &TxEnvelope) -> WalletResult<Vec<u8>>;
}

/// Fee paid by one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fee {
    pub amount: u64,
    pub denom: String,
    pub gas_limit: u64,
}

/// Transaction envelope handed to the signer.
#[derive(Debug, Clone)]
pub struct TxEnvelope {
    pub msgs: Vec<AnyMsg>,
    pub fee: Fee,
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    /// Height after which an unincluded transaction expires; zero disables.
    pub timeout_height: u64,
    /// Empty until `sign` has run.
    pub signature: Vec<u8>,
}

/// Signed, encoded transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTx {
    pub tx_bytes: Vec<u8>,
    pub sequence: u64,
    pub msg_count: usize,
}

/// Fee and timeout parameters for assembly.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub fee_per_message: u64,
    pub fee_denom: String,
    pub gas_per_message: u64,
    pub tx_timeout_height_offset: u64,
    pub block_height_refresh: Duration,
}

/// Builds and signs one transaction per batch.
pub struct TxAssembler {
    signer: Arc<dyn TxSigner>,
    chain: Arc<dyn ChainClient>,
    chain_id: String,
    account_number: u64,
    config: AssemblerConfig,
    /// Last fetched block height and when it was fetched. Refreshed at most
    /// once per `block_height_refresh`.
    height_cache: Mutex<Option<(Instant, u64)>>,
}

impl TxAssembler {
    pub fn new(
        signer: Arc<dyn TxSigner>,
        chain: Arc<dyn ChainClient>,
        chain_id: String,
        account_number: u64,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            signer,
            chain,
            chain_id,
            account_number,
            config,
            height_cache: Mutex::new(None),
        }
    }

    /// Assemble a batch into a signed transaction consuming `sequence`.
    ///
    /// Fee and gas scale with the number of messages. Any failure here is an
    /// `Assembly` error: the transaction never existed on the wire and the
    /// caller must roll the sequence reservation back.
    pub async fn assemble(&self, msgs: &[AnyMsg], sequence: u64) -> WalletResult<SignedTx> {
        if msgs.is_empty() {
            return Err(WalletError::Assembly("empty batch".to_string()));
        }
        for msg in msgs {
            if msg.type_url.is_empty() {
                return Err(WalletError::Assembly("message without type url".to_string()));
            }
        }

        let msg_count = msgs.len() as u64;
        let fee = Fee {
            amount: self.config.fee_per_message * msg_count,
            denom: self.config.fee_denom.clone(),
            gas_limit: self.config.gas_per_message * msg_count,
        };

        let timeout_height = if self.config.tx_timeout_height_offset == 0 {
            0
        } else {
            self.latest_height().await? + self.config.tx_timeout_height_offset
        };

        let mut envelope = TxEnvelope {
            msgs: msgs.to_vec(),
            fee,
            chain_id: self.chain_id.clone(),
            account_number: self.account_number,
            sequence,
            timeout_height,
            signature: Vec::new(),
        };

        envelope.signature = self
            .signer
            .sign(&envelope)
            .map_err(|e| WalletError::Assembly(format!("signing failed: {e}")))?;
        let tx_bytes = self
            .signer
            .encode(&envelope)
            .map_err(|e| WalletError::Assembly(format!("encoding failed: {e}")))?;

        Ok(SignedTx {
            tx_bytes,
            sequence,
            msg_count: msgs.len(),
        })
    }

    /// Latest block height, served from the throttled cache. A failed
    /// refresh falls back to the previous height rather than failing the
    /// batch; only a wallet that has never seen a height gives up.
    async fn latest_height(&self) -> WalletResult<u64> {
        let mut cache = self.height_cache.lock().await;
        if let Some((fetched_at, height)) = *cache {
            if fetched_at.elapsed() < self.config.block_height_refresh {
                return Ok(height);
            }
        }

        match self.chain.get_latest_block_height().await {
            Ok(height) => {
                *cache = Some((Instant::now(), height));
                Ok(height)
            }
            Err(e) => match *cache {
                Some((_, stale)) => {
                    warn!(error = %e, height = stale, "Height refresh failed, using stale height");
                    Ok(stale)
                }
                None => Err(WalletError::Assembly(format!(
                    "no known block height: {e}"
                ))),
            },
        }
    }
}
