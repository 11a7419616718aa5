use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref EXCHANGES_TOTAL: Counter =
        register_counter!("inlama_exchanges_total", "Total number of generate exchanges").unwrap();
    pub static ref FRAGMENTS_RELAYED: Counter =
        register_counter!("inlama_fragments_relayed_total", "Response fragments written to output").unwrap();
    pub static ref MALFORMED_FRAGMENTS: Counter =
        register_counter!("inlama_malformed_fragments_total", "Response lines that failed to decode").unwrap();
    pub static ref EMPTY_WINDOWS: Counter =
        register_counter!("inlama_empty_windows_total", "Buffer windows that elapsed with no input").unwrap();
    pub static ref EXCHANGE_LATENCY: Histogram = register_histogram!(
        "inlama_exchange_latency_seconds",
        "Time from request to fully relayed response in seconds"
    )
    .unwrap();
    pub static ref BUFFERED_LINES: Gauge =
        register_gauge!("inlama_buffered_lines", "Lines waiting for the next flush").unwrap();
}

/// Text exposition of everything in the default registry.
pub fn render() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
