//! Metrics module for Prometheus
//!
//! This module provides metrics collection for the gateway:
//! - Request count by method, route pattern, and status
//! - Request latency histogram
//! - Filter rejection count by filter name
//!
//! Labels only take values from a fixed set: standard methods, registered
//! patterns and [`UNMATCHED_ROUTE`]. Raw request paths are never used.

use crate::envelope::error_envelope;
use crate::filter::ResponseSink;
use crate::route::Route;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Route label for requests that never reached a registered route
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Gateway metrics collector
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    request_counter: CounterVec,
    request_latency: HistogramVec,
    rejection_counter: CounterVec,
    total_requests: Arc<AtomicU64>,
    total_errors: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl GatewayMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let request_counter = CounterVec::new(
            Opts::new("gateway_requests_total", "Total number of requests"),
            &["method", "route", "status"],
        )
        .expect("Failed to create request counter");

        let request_latency = HistogramVec::new(
            HistogramOpts::new(
                "gateway_request_latency_seconds",
                "Request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "route"],
        )
        .expect("Failed to create latency histogram");

        let rejection_counter = CounterVec::new(
            Opts::new(
                "gateway_filter_rejections_total",
                "Total number of requests rejected by a pre-filter",
            ),
            &["filter"],
        )
        .expect("Failed to create rejection counter");

        registry
            .register(Box::new(request_counter.clone()))
            .expect("Failed to register request counter");
        registry
            .register(Box::new(request_latency.clone()))
            .expect("Failed to register latency histogram");
        registry
            .register(Box::new(rejection_counter.clone()))
            .expect("Failed to register rejection counter");

        Self {
            registry,
            request_counter,
            request_latency,
            rejection_counter,
            total_requests: Arc::new(AtomicU64::new(0)),
            total_errors: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a request with its status and latency
    ///
    /// `route` must be a registered pattern or [`UNMATCHED_ROUTE`].
    pub fn record_request(&self, method: &str, route: &str, status: u16, latency: Duration) {
        let status_str = status.to_string();
        let method = Self::method_label(method);

        self.request_counter
            .with_label_values(&[method, route, &status_str])
            .inc();

        self.request_latency
            .with_label_values(&[method, route])
            .observe(latency.as_secs_f64());

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if status >= 400 {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a request rejected by the named filter
    pub fn record_rejection(&self, filter: &str) {
        self.rejection_counter.with_label_values(&[filter]).inc();
        self.total_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Render all metrics in the Prometheus text format
    pub fn prometheus_output(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn total_rejections(&self) -> u64 {
        self.total_rejections.load(Ordering::Relaxed)
    }

    /// Fold extension methods into one label
    fn method_label(method: &str) -> &str {
        match method {
            "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "HEAD" | "OPTIONS" | "CONNECT"
            | "TRACE" => method,
            _ => "OTHER",
        }
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayMetrics")
            .field("total_requests", &self.total_requests())
            .field("total_errors", &self.total_errors())
            .field("total_rejections", &self.total_rejections())
            .finish()
    }
}

/// `GET` route serving the Prometheus text output at `path`
pub fn route(metrics: Arc<GatewayMetrics>, path: &str) -> Route {
    Route::get(path, move |_req| {
        let metrics = Arc::clone(&metrics);
        async move {
            match metrics.prometheus_output() {
                Ok(output) => (StatusCode::OK, output).into_response(),
                Err(e) => {
                    error!("Failed to render metrics: {}", e);
                    error_envelope(
                        &ResponseSink::new(),
                        "failed to render metrics",
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                }
            }
        }
    })
}
