//! Transaction broadcast and outcome classification
//!
//! Submits a signed envelope in sync mode (CheckTx validation only) and
//! routes the outcome: transport failures and rejections complete the whole
//! batch immediately, a sequence-mismatch rejection additionally
//! resynchronizes the local counter, and an accepted transaction becomes a
//! confirmation ticket.

use super::assembler::SignedTx;
use super::sequencer::Sequencer;
use crate::chain::{BroadcastMode, ChainClient};
use crate::confirm::ConfirmationTicket;
use crate::error::{WalletError, WalletResult};
use crate::metrics;
use crate::queue::{DispatchTable, PendingMessage, SubmissionResult};

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub struct Broadcaster {
    chain: Arc<dyn ChainClient>,
    sequencer: Arc<Sequencer>,
    dispatch: Arc<DispatchTable>,
    ticket_tx: mpsc::Sender<ConfirmationTicket>,
}

impl Broadcaster {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        sequencer: Arc<Sequencer>,
        dispatch: Arc<DispatchTable>,
        ticket_tx: mpsc::Sender<ConfirmationTicket>,
    ) -> Self {
        Self {
            chain,
            sequencer,
            dispatch,
            ticket_tx,
        }
    }

    /// Broadcast a signed transaction carrying `batch`.
    ///
    /// Returns `Ok` when the network accepted the transaction at CheckTx;
    /// individual message completions are then deferred to the confirmation
    /// tracker. On any failure path every message in the batch is completed
    /// with a terminal error before this returns.
    pub async fn broadcast(
        &self,
        signed: SignedTx,
        batch: Vec<PendingMessage>,
    ) -> WalletResult<()> {
        let response = match self
            .chain
            .broadcast_tx(signed.tx_bytes, BroadcastMode::Sync)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, msgs = batch.len(), "Broadcast transport failure");
                metrics::record_broadcast("transport_error");
                let err = WalletError::Transport(e.to_string());
                self.fail_batch(&batch, None, err.clone());
                return Err(err);
            }
        };

        if !response.is_ok() {
            let err = WalletError::BroadcastRejected {
                code: response.code,
                raw_log: response.raw_log.clone(),
            };
            warn!(
                code = response.code,
                raw_log = %response.raw_log,
                "Broadcast rejected at CheckTx"
            );

            if response.is_sequence_mismatch() {
                metrics::record_broadcast("sequence_mismatch");
                metrics::record_sequence_resync();
                // Overwrite the local counter before any future batch is
                // assembled; the rejected batch itself is not retried here.
                if let Err(sync_err) = self.sequencer.resync(self.chain.as_ref()).await {
                    error!(error = %sync_err, "Sequence resync failed");
                }
            } else {
                metrics::record_broadcast("rejected");
            }

            self.fail_batch(&batch, Some(response), err.clone());
            return Err(err);
        }

        info!(
            tx_hash = %response.tx_hash,
            msgs = batch.len(),
            sequence = signed.sequence,
            "Transaction accepted, awaiting confirmation"
        );
        metrics::record_broadcast("accepted");

        let ticket = ConfirmationTicket::new(response.tx_hash, batch);
        self.ticket_tx
            .send(ticket)
            .await
            .map_err(|_| WalletError::Shutdown)?;

        Ok(())
    }

    fn fail_batch(
        &self,
        batch: &[PendingMessage],
        response: Option<crate::chain::TxResponse>,
        error: WalletError,
    ) {
        for item in batch {
            self.dispatch.complete(SubmissionResult::failed(
                item.request_id.clone(),
                response.clone(),
                error.clone(),
            ));
        }
    }
}
