//! Account sequence management
//!
//! Handles:
//! - Optimistic sequence reservation ahead of broadcast confirmation
//! - Rollback of reservations that never reached the network
//! - Resynchronization against the chain after an observed mismatch

use crate::chain::ChainClient;
use crate::error::WalletResult;

use tokio::sync::Mutex;
use tracing::{debug, info};

/// Single authoritative owner of the wallet account's next sequence number.
///
/// One transaction consumes exactly one sequence number regardless of how
/// many messages it carries (Cosmos-SDK account semantics). Reservation is
/// optimistic: the counter advances before the broadcast round-trip so
/// back-to-back batches never wait on confirmation, and a desynchronized
/// counter is recovered through [`resync`] when the chain rejects a
/// mismatched sequence.
///
/// The flush loop is the only caller of [`reserve`] and awaits the full
/// assemble-and-broadcast step before the next batch, so reservation through
/// broadcast acceptance is serialized across batches.
///
/// [`reserve`]: Sequencer::reserve
/// [`resync`]: Sequencer::resync
pub struct Sequencer {
    address: String,
    account_number: u64,
    sequence: Mutex<u64>,
}

impl Sequencer {
    pub fn new(address: String, account_number: u64, initial_sequence: u64) -> Self {
        Self {
            address,
            account_number,
            sequence: Mutex::new(initial_sequence),
        }
    }

    pub fn account_number(&self) -> u64 {
        self.account_number
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Reserve the next sequence number for one transaction.
    pub async fn reserve(&self) -> u64 {
        let mut sequence = self.sequence.lock().await;
        let reserved = *sequence;
        *sequence += 1;
        debug!(sequence = reserved, "Reserved sequence number");
        reserved
    }

    /// Roll back a reservation whose transaction never left the process.
    ///
    /// Only safe before any bytes reach the network (assembly failure); a
    /// broadcast that may have touched the mempool must instead recover via
    /// [`resync`] after the chain reports the mismatch.
    ///
    /// [`resync`]: Sequencer::resync
    pub async fn rollback(&self, reserved: u64) {
        let mut sequence = self.sequence.lock().await;
        if *sequence == reserved + 1 {
            *sequence = reserved;
            debug!(sequence = reserved, "Rolled back sequence reservation");
        }
    }

    /// Overwrite the local counter with the chain's authoritative value.
    pub async fn resync(&self, chain: &dyn ChainClient) -> WalletResult<u64> {
        let account = chain.get_account(&self.address).await?;
        let mut sequence = self.sequence.lock().await;
        info!(
            local = *sequence,
            on_chain = account.sequence,
            "Resynchronized account sequence"
        );
        *sequence = account.sequence;
        Ok(account.sequence)
    }

    /// Current next-to-use sequence number.
    pub async fn current(&self) -> u64 {
        *self.sequence.lock().await
    }
}
