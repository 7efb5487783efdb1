//! Asynchronous wallet pipeline for batched, ordered on-chain transaction
//! submission.
//!
//! Callers submit opaque chain messages; the pipeline batches everything
//! submitted within one flush interval into a single signed transaction,
//! reserves account sequence numbers under a single-owner discipline,
//! broadcasts in sync (CheckTx) mode with nonce-conflict recovery, and polls
//! accepted transactions to finality with exponential backoff. Each message
//! receives exactly one completion: returned to a blocked `submit` caller or
//! handed to a `submit_async` callback.
//!
//! Network access and key material stay outside the crate behind the
//! [`ChainClient`] and [`TxSigner`] traits.

pub mod chain;
pub mod config;
pub mod confirm;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod tx;
pub mod wallet;

pub use chain::{AccountInfo, AnyMsg, BroadcastMode, ChainClient, TxResponse};
pub use config::WalletConfig;
pub use error::{WalletError, WalletResult};
pub use queue::{CompletionCallback, CompletionObserver, SubmissionResult};
pub use tx::{Fee, TxEnvelope, TxSigner};
pub use wallet::Wallet;
