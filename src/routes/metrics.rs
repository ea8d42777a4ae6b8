use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics: Prometheus text exposition of scanner, cache and demand counters.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for every counter the service emits.
pub fn describe() {
    metrics::describe_counter!(
        "scanner_scans_created_total",
        "Remote scans created"
    );
    metrics::describe_counter!(
        "scanner_failures_total",
        "Failed scanner requests, by operation"
    );
    metrics::describe_counter!(
        "demand_signature_rejections_total",
        "Demands rejected because their signature did not match"
    );
    metrics::describe_counter!(
        "content_cache_hits_total",
        "Preview fetches answered from the content cache"
    );
    metrics::describe_counter!(
        "alt_text_generated_total",
        "Alt texts generated by the AI API"
    );
}
