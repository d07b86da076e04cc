use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use prometheus::{Encoder, TextEncoder};

pub static CHAT_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("responder_chat_requests_total", "Chat questions received")
        .expect("metric can be registered")
});

pub static CHAT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("responder_chat_failures_total", "Chat questions that could not be answered")
        .expect("metric can be registered")
});

pub static FEEDBACK_VOTES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("responder_feedback_votes_total", "Feedback on answers", &["vote"])
        .expect("metric can be registered")
});

/// Renders the default registry in the Prometheus text format.
pub fn render() -> (Vec<u8>, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    (buffer, encoder.format_type().to_string())
}
