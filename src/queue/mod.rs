//! Batching queue for submitted messages
//!
//! The process-wide intake point: callers enqueue messages from arbitrary
//! tasks, and the flush loop drains everything resident in the queue into one
//! batch per tick. Enqueue is fail-fast when the queue is full; draining is
//! non-blocking and never observes messages added after it begins.

pub mod dispatch;

pub use dispatch::{
    CompletionCallback, CompletionObserver, DispatchTable, SubmissionResult, Waiter,
};

use crate::chain::AnyMsg;
use crate::error::{WalletError, WalletResult};
use crate::metrics;

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Mutex, RwLock};
use uuid::Uuid;

/// One message waiting for (or travelling through) a flush.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub request_id: String,
    pub msg: AnyMsg,
    /// Fire-and-forget submissions have no blocking caller; their waiter, if
    /// any, is a callback in the dispatch table.
    pub fire_and_forget: bool,
}

/// Bounded intake queue with a single drain consumer.
pub struct MsgQueue {
    queue_tx: mpsc::Sender<PendingMessage>,
    /// Exactly one drain loop runs at a time; the mutex enforces it.
    queue_rx: Mutex<mpsc::Receiver<PendingMessage>>,
    dispatch: Arc<DispatchTable>,
    shutdown: Arc<RwLock<bool>>,
}

impl MsgQueue {
    pub fn new(
        capacity: usize,
        dispatch: Arc<DispatchTable>,
        shutdown: Arc<RwLock<bool>>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        Self {
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            dispatch,
            shutdown,
        }
    }

    /// Submit a message and wait for its completion.
    ///
    /// Errors only for enqueue-time conditions (queue full, shutdown); every
    /// per-message failure arrives inside the returned [`SubmissionResult`].
    pub async fn submit(&self, msg: AnyMsg) -> WalletResult<SubmissionResult> {
        let request_id = Uuid::new_v4().to_string();
        let (result_tx, result_rx) = oneshot::channel();
        self.dispatch
            .register(&request_id, Waiter::Blocking(result_tx));

        if let Err(e) = self.enqueue(request_id.clone(), msg, false).await {
            self.dispatch.deregister(&request_id);
            return Err(e);
        }

        // The sender side is dropped without delivery only when the wallet
        // shuts down with the ticket still in flight.
        result_rx.await.map_err(|_| WalletError::Shutdown)
    }

    /// Submit a message without waiting. The callback, if provided, is
    /// invoked exactly once with the completion result; with no callback the
    /// completion is dropped silently.
    pub async fn submit_async(
        &self,
        msg: AnyMsg,
        callback: Option<CompletionCallback>,
    ) -> WalletResult<String> {
        let request_id = Uuid::new_v4().to_string();
        if let Some(callback) = callback {
            self.dispatch
                .register(&request_id, Waiter::Callback(callback));
        }

        if let Err(e) = self.enqueue(request_id.clone(), msg, true).await {
            self.dispatch.deregister(&request_id);
            return Err(e);
        }

        Ok(request_id)
    }

    async fn enqueue(
        &self,
        request_id: String,
        msg: AnyMsg,
        fire_and_forget: bool,
    ) -> WalletResult<()> {
        if *self.shutdown.read().await {
            return Err(WalletError::Shutdown);
        }

        let item = PendingMessage {
            request_id,
            msg,
            fire_and_forget,
        };
        match self.queue_tx.try_send(item) {
            Ok(()) => {
                metrics::record_msg_submitted();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(WalletError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(WalletError::Shutdown),
        }
    }

    /// Drain every message currently resident in the queue, in insertion
    /// order, into one batch. Messages enqueued after the drain begins land
    /// in the next batch. An empty queue yields an empty batch.
    pub async fn drain(&self) -> Vec<PendingMessage> {
        let mut queue_rx = self.queue_rx.lock().await;
        let mut batch = Vec::new();
        while let Ok(item) = queue_rx.try_recv() {
            batch.push(item);
        }
        batch
    }
}
