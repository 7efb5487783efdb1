//! Error types for the wallet pipeline

use thiserror::Error;

/// Main error type for the wallet pipeline.
///
/// Per-message failures are cloned into the [`SubmissionResult`] of every
/// message in the affected batch, so the variants carry owned strings rather
/// than source errors.
///
/// [`SubmissionResult`]: crate::queue::SubmissionResult
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Account error: {0}")]
    Account(String),

    #[error("Assembly error: {0}")]
    Assembly(String),

    #[error("Broadcast rejected with code {code}: {raw_log}")]
    BroadcastRejected { code: u32, raw_log: String },

    #[error("Transaction {tx_hash} failed on-chain with code {code}: {raw_log}")]
    ConfirmationFailed {
        tx_hash: String,
        code: u32,
        raw_log: String,
    },

    /// The transaction was accepted but no terminal status was observed
    /// within the confirmation window. The transaction may still be included
    /// on-chain later; callers deciding to resubmit must account for that.
    #[error("Confirmation timed out for transaction {tx_hash}")]
    ConfirmationTimedOut { tx_hash: String },

    #[error("Message queue is full")]
    QueueFull,

    #[error("Wallet is shut down")]
    Shutdown,

    #[error("Signing error: {0}")]
    Signing(String),
}

impl WalletError {
    /// Check if resubmitting the affected messages is reasonable.
    ///
    /// `ConfirmationTimedOut` is retryable only in the weak sense that the
    /// caller may resubmit; the original transaction can still land.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::Transport(_)
                | WalletError::QueueFull
                | WalletError::ConfirmationTimedOut { .. }
        )
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
