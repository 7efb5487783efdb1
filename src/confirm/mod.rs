//! Confirmation tracking for accepted transactions
//!
//! A transaction accepted at CheckTx is not final: it still has to be
//! included in a block and executed. Each accepted batch becomes a
//! [`ConfirmationTicket`] polled until a terminal outcome:
//!
//! - `Confirmed`: lookup returned code 0
//! - `Failed`: lookup returned a non-zero code (execution rejected it)
//! - `TimedOut`: no terminal status inside the confirmation window
//!
//! Lookups back off exponentially above a linear floor. Tickets are polled
//! on independent tasks gated by a semaphore, so a slow ticket never blocks
//! confirmation of others and a rejection storm cannot spawn unbounded work.

use crate::chain::ChainClient;
use crate::error::WalletError;
use crate::metrics;
use crate::queue::{DispatchTable, PendingMessage, SubmissionResult};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Backoff exponent saturates here; far beyond any usable timeout window.
const MAX_BACKOFF_EXP: u32 = 32;

/// Interval at which the intake loop re-checks the shutdown flag.
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// One accepted transaction awaiting its final on-chain status.
#[derive(Debug)]
pub struct ConfirmationTicket {
    pub tx_hash: String,
    /// Batch messages in their original order; completions are delivered in
    /// this order.
    pub messages: Vec<PendingMessage>,
    pub created_at: Instant,
    pub retry_count: u32,
}

impl ConfirmationTicket {
    pub fn new(tx_hash: String, messages: Vec<PendingMessage>) -> Self {
        Self {
            tx_hash,
            messages,
            created_at: Instant::now(),
            retry_count: 0,
        }
    }
}

/// Delay before lookup retry `retry_count`: a linear floor plus an
/// exponential component, strictly increasing in the retry count.
fn retry_delay(min_interval: Duration, retry_count: u32) -> Duration {
    let exp = retry_count.min(MAX_BACKOFF_EXP);
    min_interval + Duration::from_secs(1u64 << exp)
}

/// Polls accepted transactions to their terminal status.
pub struct ConfirmationTracker {
    chain: Arc<dyn ChainClient>,
    dispatch: Arc<DispatchTable>,
    min_interval: Duration,
    timeout: Duration,
    /// Caps concurrently polled tickets.
    limit: Arc<Semaphore>,
    shutdown: Arc<RwLock<bool>>,
}

impl ConfirmationTracker {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        dispatch: Arc<DispatchTable>,
        min_interval: Duration,
        timeout: Duration,
        max_in_flight: usize,
        shutdown: Arc<RwLock<bool>>,
    ) -> Self {
        Self {
            chain,
            dispatch,
            min_interval,
            timeout,
            limit: Arc::new(Semaphore::new(max_in_flight)),
            shutdown,
        }
    }

    /// Intake loop: receives tickets and polls each on its own task.
    /// Exits on shutdown or when the ticket channel closes; in-flight
    /// tickets are abandoned on shutdown without further delivery.
    pub async fn run(self: Arc<Self>, mut ticket_rx: mpsc::Receiver<ConfirmationTicket>) {
        info!("Confirmation tracker started");
        let mut shutdown_check = tokio::time::interval(SHUTDOWN_CHECK_INTERVAL);

        loop {
            if *self.shutdown.read().await {
                break;
            }

            tokio::select! {
                maybe_ticket = ticket_rx.recv() => {
                    let Some(ticket) = maybe_ticket else { break };
                    let permit = match self.limit.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let tracker = self.clone();
                    tokio::spawn(async move {
                        tracker.confirm(ticket).await;
                        drop(permit);
                    });
                }
                _ = shutdown_check.tick() => {}
            }
        }

        info!("Confirmation tracker stopped");
    }

    /// Poll one ticket to its terminal outcome.
    pub async fn confirm(&self, mut ticket: ConfirmationTicket) {
        loop {
            if *self.shutdown.read().await {
                debug!(tx_hash = %ticket.tx_hash, "Abandoning ticket on shutdown");
                return;
            }

            if ticket.created_at.elapsed() >= self.timeout {
                warn!(
                    tx_hash = %ticket.tx_hash,
                    retries = ticket.retry_count,
                    "Confirmation timed out"
                );
                metrics::record_confirmation("timed_out");
                self.deliver(
                    &ticket,
                    None,
                    Some(WalletError::ConfirmationTimedOut {
                        tx_hash: ticket.tx_hash.clone(),
                    }),
                );
                return;
            }

            match self.chain.get_tx(&ticket.tx_hash).await {
                Ok(Some(response)) if response.is_ok() => {
                    info!(tx_hash = %ticket.tx_hash, "Transaction confirmed");
                    metrics::record_confirmation("confirmed");
                    metrics::record_confirm_latency(ticket.created_at.elapsed().as_secs_f64());
                    self.deliver(&ticket, Some(response), None);
                    return;
                }
                Ok(Some(response)) => {
                    error!(
                        tx_hash = %ticket.tx_hash,
                        code = response.code,
                        raw_log = %response.raw_log,
                        "Transaction failed on-chain"
                    );
                    metrics::record_confirmation("failed");
                    let err = WalletError::ConfirmationFailed {
                        tx_hash: ticket.tx_hash.clone(),
                        code: response.code,
                        raw_log: response.raw_log.clone(),
                    };
                    self.deliver(&ticket, Some(response), Some(err));
                    return;
                }
                // Not yet included; retry.
                Ok(None) => {
                    debug!(tx_hash = %ticket.tx_hash, "Transaction not yet included");
                }
                Err(e) => {
                    debug!(tx_hash = %ticket.tx_hash, error = %e, "Confirmation lookup failed");
                }
            }

            let delay = retry_delay(self.min_interval, ticket.retry_count);
            ticket.retry_count += 1;
            metrics::record_confirm_retry();
            tokio::time::sleep(delay).await;
        }
    }

    /// Complete every message of the ticket, in original batch order.
    fn deliver(
        &self,
        ticket: &ConfirmationTicket,
        response: Option<crate::chain::TxResponse>,
        error: Option<WalletError>,
    ) {
        for item in &ticket.messages {
            self.dispatch.complete(SubmissionResult {
                request_id: item.request_id.clone(),
                response: response.clone(),
                error: error.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{AnyMsg, MockChainClient, TxResponse};
    use crate::queue::Waiter;
    use tokio::sync::oneshot;

    fn ticket_with(n: usize) -> (ConfirmationTicket, Vec<oneshot::Receiver<SubmissionResult>>, Arc<DispatchTable>)
    {
        let dispatch = Arc::new(DispatchTable::new());
        let mut receivers = Vec::new();
        let messages = (0..n)
            .map(|i| {
                let request_id = format!("req-{i}");
                let (tx, rx) = oneshot::channel();
                dispatch.register(&request_id, Waiter::Blocking(tx));
                receivers.push(rx);
                PendingMessage {
                    request_id,
                    msg: AnyMsg::new("/test.Msg", vec![i as u8]),
                    fire_and_forget: false,
                }
            })
            .collect();
        (
            ConfirmationTicket::new("HASH".to_string(), messages),
            receivers,
            dispatch,
        )
    }

    fn tracker(chain: MockChainClient, dispatch: Arc<DispatchTable>) -> ConfirmationTracker {
        ConfirmationTracker::new(
            Arc::new(chain),
            dispatch,
            Duration::from_secs(1),
            Duration::from_secs(30),
            4,
            Arc::new(RwLock::new(false)),
        )
    }

    #[test]
    fn test_retry_delay_is_monotonically_increasing() {
        let min = Duration::from_secs(5);
        let mut last = Duration::ZERO;
        for k in 0..10 {
            let delay = retry_delay(min, k);
            assert!(delay > last, "delay must increase at retry {k}");
            assert!(delay >= min);
            last = delay;
        }
        // Saturates instead of overflowing.
        assert_eq!(retry_delay(min, u32::MAX), retry_delay(min, MAX_BACKOFF_EXP));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_delivers_to_all_messages_in_order() {
        let mut chain = MockChainClient::new();
        chain.expect_get_tx().times(1).returning(|hash| {
            Ok(Some(TxResponse {
                code: 0,
                tx_hash: hash.to_string(),
                raw_log: String::new(),
            }))
        });

        let (ticket, receivers, dispatch) = ticket_with(3);
        tracker(chain, dispatch).confirm(ticket).await;

        for (i, rx) in receivers.into_iter().enumerate() {
            let result = rx.await.unwrap();
            assert_eq!(result.request_id, format!("req-{i}"));
            assert!(result.is_ok());
            assert_eq!(result.response.unwrap().tx_hash, "HASH");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_retries_until_confirmed() {
        let mut chain = MockChainClient::new();
        let mut lookups = 0;
        chain.expect_get_tx().times(3).returning(move |hash| {
            lookups += 1;
            if lookups < 3 {
                Ok(None)
            } else {
                Ok(Some(TxResponse {
                    code: 0,
                    tx_hash: hash.to_string(),
                    raw_log: String::new(),
                }))
            }
        });

        let (ticket, mut receivers, dispatch) = ticket_with(1);
        tracker(chain, dispatch).confirm(ticket).await;

        assert!(receivers.remove(0).await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nonzero_code_is_terminal_failure() {
        let mut chain = MockChainClient::new();
        chain.expect_get_tx().times(1).returning(|hash| {
            Ok(Some(TxResponse {
                code: 11,
                tx_hash: hash.to_string(),
                raw_log: "out of gas".to_string(),
            }))
        });

        let (ticket, mut receivers, dispatch) = ticket_with(1);
        tracker(chain, dispatch).confirm(ticket).await;

        let result = receivers.remove(0).await.unwrap();
        assert!(matches!(
            result.error,
            Some(WalletError::ConfirmationFailed { code: 11, .. })
        ));
        // The on-chain response still travels with the failure.
        assert_eq!(result.response.unwrap().raw_log, "out of gas");
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_included_times_out_not_before_deadline() {
        let mut chain = MockChainClient::new();
        chain.expect_get_tx().returning(|_| Ok(None));

        let (ticket, mut receivers, dispatch) = ticket_with(2);
        let created_at = ticket.created_at;
        let tracker = ConfirmationTracker::new(
            Arc::new(chain),
            dispatch,
            Duration::from_secs(1),
            Duration::from_secs(10),
            4,
            Arc::new(RwLock::new(false)),
        );

        tracker.confirm(ticket).await;

        assert!(created_at.elapsed() >= Duration::from_secs(10));
        for rx in receivers.drain(..) {
            let result = rx.await.unwrap();
            assert!(matches!(
                result.error,
                Some(WalletError::ConfirmationTimedOut { .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_ticket_without_delivery() {
        let mut chain = MockChainClient::new();
        chain.expect_get_tx().returning(|_| Ok(None));

        let (ticket, _receivers, dispatch) = ticket_with(1);
        let shutdown = Arc::new(RwLock::new(false));
        let tracker = ConfirmationTracker::new(
            Arc::new(chain),
            dispatch.clone(),
            Duration::from_secs(1),
            Duration::from_secs(300),
            4,
            shutdown.clone(),
        );

        *shutdown.write().await = true;
        tracker.confirm(ticket).await;

        // Abandoned: the waiter is still registered, nothing was delivered.
        assert_eq!(dispatch.waiting(), 1);
    }
}
