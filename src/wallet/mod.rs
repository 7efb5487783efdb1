//! Wallet - the public surface of the submission pipeline
//!
//! [`Wallet::connect`] binds the signing account (number, initial sequence,
//! chain id) and starts the two background loops: the flush loop that drains
//! the batching queue into signed transactions, and the confirmation tracker
//! that polls accepted transactions to finality. Callers then use
//! [`Wallet::submit`] / [`Wallet::submit_async`] from any task.

use crate::chain::{AnyMsg, ChainClient};
use crate::config::WalletConfig;
use crate::confirm::ConfirmationTracker;
use crate::error::{WalletError, WalletResult};
use crate::metrics;
use crate::queue::{
    CompletionCallback, CompletionObserver, DispatchTable, MsgQueue, PendingMessage,
    SubmissionResult,
};
use crate::tx::{AssemblerConfig, Broadcaster, Sequencer, TxAssembler, TxSigner};

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Buffer between broadcast acceptance and confirmation intake.
const TICKET_CHANNEL_CAPACITY: usize = 100;

/// A connected wallet running the submission pipeline.
pub struct Wallet {
    address: String,
    chain_id: String,
    account_number: u64,
    queue: Arc<MsgQueue>,
    dispatch: Arc<DispatchTable>,
    sequencer: Arc<Sequencer>,
    shutdown: Arc<RwLock<bool>>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Wallet {
    /// Connect the wallet: fetch chain id and account metadata, bind the
    /// account number and initial sequence, and start the pipeline loops.
    pub async fn connect(
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn TxSigner>,
        config: WalletConfig,
    ) -> WalletResult<Self> {
        config
            .validate()
            .map_err(|e| WalletError::Config(e.to_string()))?;

        let chain_id = chain.get_chain_id().await?;
        let address = signer.address();
        let account = chain.get_account(&address).await?;
        if account.account_number == 0 {
            return Err(WalletError::Account(format!(
                "account {address} is not set up on chain {chain_id}"
            )));
        }

        info!(
            %address,
            %chain_id,
            account_number = account.account_number,
            sequence = account.sequence,
            "Wallet connected"
        );

        let shutdown = Arc::new(RwLock::new(false));
        let dispatch = Arc::new(DispatchTable::new());
        let queue = Arc::new(MsgQueue::new(
            config.queue_capacity,
            dispatch.clone(),
            shutdown.clone(),
        ));
        let sequencer = Arc::new(Sequencer::new(
            address.clone(),
            account.account_number,
            account.sequence,
        ));
        let assembler = Arc::new(TxAssembler::new(
            signer,
            chain.clone(),
            chain_id.clone(),
            account.account_number,
            AssemblerConfig {
                fee_per_message: config.fee_per_message,
                fee_denom: config.fee_denom.clone(),
                gas_per_message: config.gas_per_message,
                tx_timeout_height_offset: config.tx_timeout_height_offset,
                block_height_refresh: config.block_height_refresh(),
            },
        ));

        let (ticket_tx, ticket_rx) = mpsc::channel(TICKET_CHANNEL_CAPACITY);
        let broadcaster = Arc::new(Broadcaster::new(
            chain.clone(),
            sequencer.clone(),
            dispatch.clone(),
            ticket_tx,
        ));
        let tracker = Arc::new(ConfirmationTracker::new(
            chain,
            dispatch.clone(),
            config.confirm_min_interval(),
            config.confirm_timeout(),
            config.max_in_flight_confirmations,
            shutdown.clone(),
        ));

        let mut handles = Vec::new();
        handles.push(tokio::spawn(tracker.run(ticket_rx)));
        handles.push(tokio::spawn(run_flush_loop(
            queue.clone(),
            sequencer.clone(),
            assembler,
            broadcaster,
            dispatch.clone(),
            shutdown.clone(),
            config.flush_interval(),
        )));

        Ok(Self {
            address,
            chain_id,
            account_number: account.account_number,
            queue,
            dispatch,
            sequencer,
            shutdown,
            handles: std::sync::Mutex::new(handles),
        })
    }

    /// Submit a message and wait for its final result.
    ///
    /// Per-message failures arrive inside the returned [`SubmissionResult`];
    /// `Err` is reserved for enqueue-time conditions (queue full, shutdown).
    pub async fn submit(&self, msg: AnyMsg) -> WalletResult<SubmissionResult> {
        self.queue.submit(msg).await
    }

    /// Submit a message without waiting. The callback, if any, runs exactly
    /// once with the final result; without one the completion is dropped
    /// silently. Returns the request id.
    pub async fn submit_async(
        &self,
        msg: AnyMsg,
        callback: Option<CompletionCallback>,
    ) -> WalletResult<String> {
        self.queue.submit_async(msg, callback).await
    }

    /// Install a process-wide observer invoked with every finalized result,
    /// regardless of which caller originated the message.
    pub fn set_observer(&self, observer: CompletionObserver) {
        self.dispatch.set_observer(observer);
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn account_number(&self) -> u64 {
        self.account_number
    }

    /// Next sequence number the pipeline will reserve.
    pub async fn sequence(&self) -> u64 {
        self.sequencer.current().await
    }

    /// Signal shutdown and stop the background loops. New submissions are
    /// rejected; in-flight confirmation tickets are abandoned without
    /// further callback delivery.
    pub async fn disconnect(&self) {
        *self.shutdown.write().await = true;
        for handle in self
            .handles
            .lock()
            .expect("handle lock poisoned")
            .drain(..)
        {
            handle.abort();
        }
        info!(address = %self.address, "Wallet disconnected");
    }
}

/// Drain the queue into one batch per tick and push each batch through
/// assembly and broadcast. The loop awaits the full pipeline step before the
/// next drain, which serializes sequence reservation across batches.
async fn run_flush_loop(
    queue: Arc<MsgQueue>,
    sequencer: Arc<Sequencer>,
    assembler: Arc<TxAssembler>,
    broadcaster: Arc<Broadcaster>,
    dispatch: Arc<DispatchTable>,
    shutdown: Arc<RwLock<bool>>,
    flush_interval: std::time::Duration,
) {
    info!("Flush loop started");
    let mut tick = tokio::time::interval(flush_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tick.tick().await;
        if *shutdown.read().await {
            break;
        }

        let batch = queue.drain().await;
        if batch.is_empty() {
            continue;
        }
        metrics::record_batch_flushed();
        process_batch(&sequencer, &assembler, &broadcaster, &dispatch, batch).await;
    }

    info!("Flush loop stopped");
}

async fn process_batch(
    sequencer: &Sequencer,
    assembler: &TxAssembler,
    broadcaster: &Broadcaster,
    dispatch: &DispatchTable,
    batch: Vec<PendingMessage>,
) {
    let msgs: Vec<AnyMsg> = batch.iter().map(|item| item.msg.clone()).collect();
    let sequence = sequencer.reserve().await;

    let signed = match assembler.assemble(&msgs, sequence).await {
        Ok(signed) => signed,
        Err(e) => {
            // The transaction never reached the wire, so the reservation can
            // be returned instead of desynchronizing the counter.
            sequencer.rollback(sequence).await;
            error!(error = %e, msgs = batch.len(), "Batch assembly failed");
            for item in &batch {
                dispatch.complete(SubmissionResult::failed(
                    item.request_id.clone(),
                    None,
                    e.clone(),
                ));
            }
            return;
        }
    };

    // Failure paths complete the batch per-message inside the broadcaster.
    let _ = broadcaster.broadcast(signed, batch).await;
}
