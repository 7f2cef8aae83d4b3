use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static CALLBACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pc_sample_callbacks_total",
        "PC callbacks received, by outcome (recorded, ignored, rejected, failed)",
        &["outcome"]
    )
    .expect("register callbacks_total")
});

pub static PC_CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pc_sample_pc_calls_total",
        "Calls made to the PC server, by operation and result",
        &["operation", "result"]
    )
    .expect("register pc_calls_total")
});

pub fn record_pc_call<T, E>(operation: &str, res: &Result<T, E>) {
    let result = if res.is_ok() { "ok" } else { "error" };
    PC_CALLS_TOTAL.with_label_values(&[operation, result]).inc();
}

/// Render the default registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("metrics encode error: {e}"))?;
    String::from_utf8(buffer).map_err(|e| format!("metrics encode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_text_output() {
        CALLBACKS_TOTAL.with_label_values(&["ignored"]).inc();
        record_pc_call::<(), ()>("create_user", &Err(()));
        let text = encode_metrics().unwrap();
        assert!(text.contains("pc_sample_callbacks_total"));
        assert!(text.contains("pc_sample_pc_calls_total"));
    }
}
