//! Prometheus metrics for the pipeline
//!
//! Counters register against the default registry; exposing them over HTTP
//! is left to the embedding application.

use crate::queue::SubmissionResult;

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

lazy_static! {
    pub static ref MSGS_SUBMITTED: IntCounter = register_int_counter!(
        "chainwallet_messages_submitted_total",
        "Total messages accepted into the batching queue"
    )
    .unwrap();

    pub static ref MSGS_COMPLETED: IntCounterVec = register_int_counter_vec!(
        "chainwallet_messages_completed_total",
        "Total message completions by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref BATCHES_FLUSHED: IntCounter = register_int_counter!(
        "chainwallet_batches_flushed_total",
        "Total non-empty batches drained from the queue"
    )
    .unwrap();

    pub static ref TXS_BROADCAST: IntCounterVec = register_int_counter_vec!(
        "chainwallet_transactions_broadcast_total",
        "Total broadcast attempts by immediate outcome",
        &["result"]
    )
    .unwrap();

    pub static ref SEQUENCE_RESYNCS: IntCounter = register_int_counter!(
        "chainwallet_sequence_resyncs_total",
        "Total sequence resynchronizations after a nonce mismatch"
    )
    .unwrap();

    pub static ref CONFIRMATIONS: IntCounterVec = register_int_counter_vec!(
        "chainwallet_confirmations_total",
        "Total confirmation outcomes",
        &["status"]
    )
    .unwrap();

    pub static ref CONFIRM_RETRIES: IntCounter = register_int_counter!(
        "chainwallet_confirmation_retries_total",
        "Total confirmation lookup retries"
    )
    .unwrap();

    pub static ref CONFIRM_LATENCY: Histogram = register_histogram!(
        "chainwallet_confirmation_latency_seconds",
        "Time from broadcast acceptance to observed terminal status",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();
}

// Helper functions to record metrics

pub fn record_msg_submitted() {
    MSGS_SUBMITTED.inc();
}

pub fn record_completion(result: &SubmissionResult) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    MSGS_COMPLETED.with_label_values(&[outcome]).inc();
}

pub fn record_batch_flushed() {
    BATCHES_FLUSHED.inc();
}

pub fn record_broadcast(result: &str) {
    TXS_BROADCAST.with_label_values(&[result]).inc();
}

pub fn record_sequence_resync() {
    SEQUENCE_RESYNCS.inc();
}

pub fn record_confirmation(status: &str) {
    CONFIRMATIONS.with_label_values(&[status]).inc();
}

pub fn record_confirm_retry() {
    CONFIRM_RETRIES.inc();
}

pub fn record_confirm_latency(latency_secs: f64) {
    CONFIRM_LATENCY.observe(latency_secs);
}
