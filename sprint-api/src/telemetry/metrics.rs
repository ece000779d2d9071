//! Prometheus Metrics Definitions
//!
//! Defines all service metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use sprint_core::PaymentStatus;
use sprint_lifecycle::SweepReport;
use sprint_storage::CacheStats;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<SprintMetrics>> = Lazy::new(SprintMetrics::new);

/// Container for all service metrics.
#[derive(Clone)]
pub struct SprintMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Read-through cache counters mirrored at scrape time - labels: outcome
    pub cache_operations: GaugeVec,

    /// Payment transitions applied - labels: status
    pub payment_transitions_total: CounterVec,

    /// Sweep results - labels: result (reclaimed/skipped/storage_failure)
    pub file_sweep_total: CounterVec,
}

impl SprintMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "sprint_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "sprint_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            cache_operations: register_gauge_vec!(
                "sprint_cache_operations",
                "Read-through cache operations since startup",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register cache_operations: {}", e)))?,

            payment_transitions_total: register_counter_vec!(
                "sprint_payment_transitions_total",
                "Payment status transitions applied",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register payment_transitions_total: {}", e)))?,

            file_sweep_total: register_counter_vec!(
                "sprint_file_sweep_total",
                "Files handled by the temporary file sweep",
                &["result"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register file_sweep_total: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Copy the cache's own counters into the exported gauges.
    pub fn observe_cache(&self, stats: &CacheStats) {
        let outcomes = [
            ("hit", stats.hits),
            ("miss", stats.misses),
            ("error", stats.errors),
            ("invalidation", stats.invalidations),
            ("population", stats.populations),
            ("skipped_population", stats.skipped_populations),
        ];
        for (outcome, value) in outcomes {
            self.cache_operations
                .with_label_values(&[outcome])
                .set(value as f64);
        }
    }

    pub fn record_payment_transition(&self, status: PaymentStatus) {
        self.payment_transitions_total
            .with_label_values(&[status.as_db_str()])
            .inc();
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        let results = [
            ("reclaimed", report.reclaimed),
            ("skipped", report.skipped),
            ("storage_failure", report.storage_failures),
        ];
        for (result, count) in results {
            self.file_sweep_total
                .with_label_values(&[result])
                .inc_by(count as f64);
        }
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.observe_cache(&state.services.cache().stats());
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
