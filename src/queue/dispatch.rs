//! Dispatch table matching completion results back to callers
//!
//! Every submitted message registers at most one [`Waiter`] keyed by request
//! id: a oneshot sender for blocking callers or a boxed callback for
//! asynchronous ones. Completion removes the waiter, so delivery is
//! exactly-once by construction. A process-wide observer, if registered,
//! sees every result regardless of which caller originated it.

use crate::chain::TxResponse;
use crate::error::WalletError;
use crate::metrics;

use dashmap::DashMap;
use std::sync::RwLock;
use tokio::sync::oneshot;
use tracing::debug;

/// Final outcome for one submitted message.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    /// Id returned to the caller at submission time.
    pub request_id: String,
    /// Chain response, when one was observed. Success and on-chain failure
    /// both carry the response; transport and assembly failures do not.
    pub response: Option<TxResponse>,
    /// Classified error, absent on success.
    pub error: Option<WalletError>,
}

impl SubmissionResult {
    pub fn ok(request_id: String, response: TxResponse) -> Self {
        Self {
            request_id,
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(
        request_id: String,
        response: Option<TxResponse>,
        error: WalletError,
    ) -> Self {
        Self {
            request_id,
            response,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Callback invoked exactly once with the completion result. `Sync` because
/// the waiter table is shared across the flush loop and every confirmation
/// task.
pub type CompletionCallback = Box<dyn FnOnce(SubmissionResult) + Send + Sync + 'static>;

/// Observer invoked for every completion in the process.
pub type CompletionObserver = Box<dyn Fn(&SubmissionResult) + Send + Sync + 'static>;

/// How a completion is handed back to its originator.
pub enum Waiter {
    /// A caller blocked in `submit`, parked on the receiving half.
    Blocking(oneshot::Sender<SubmissionResult>),
    /// A caller-supplied callback from `submit_async`.
    Callback(CompletionCallback),
}

/// Request-id keyed registry of completion waiters.
pub struct DispatchTable {
    waiters: DashMap<String, Waiter>,
    observer: RwLock<Option<CompletionObserver>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            waiters: DashMap::new(),
            observer: RwLock::new(None),
        }
    }

    /// Register a waiter for a request id. Fire-and-forget submissions with
    /// no callback simply never register.
    pub fn register(&self, request_id: &str, waiter: Waiter) {
        self.waiters.insert(request_id.to_string(), waiter);
    }

    /// Drop a registration that never made it into the queue.
    pub fn deregister(&self, request_id: &str) {
        self.waiters.remove(request_id);
    }

    /// Install the process-wide completion observer.
    pub fn set_observer(&self, observer: CompletionObserver) {
        *self.observer.write().expect("observer lock poisoned") = Some(observer);
    }

    /// Deliver a result to its waiter, if any, and to the observer.
    pub fn complete(&self, result: SubmissionResult) {
        if let Some(observer) = self.observer.read().expect("observer lock poisoned").as_ref() {
            observer(&result);
        }
        metrics::record_completion(&result);

        match self.waiters.remove(&result.request_id) {
            Some((_, Waiter::Blocking(tx))) => {
                if tx.send(result).is_err() {
                    // Caller gave up waiting; nothing left to deliver to.
                    debug!("Blocking waiter dropped before completion");
                }
            }
            Some((_, Waiter::Callback(callback))) => callback(result),
            None => {
                debug!(request_id = %result.request_id, "No waiter for completion");
            }
        }
    }

    /// Number of registered waiters, for tests and diagnostics.
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}
