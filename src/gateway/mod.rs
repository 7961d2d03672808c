//! Gateway module
//!
//! Composes the pre-filter chain and the route table. A [`GatewayBuilder`]
//! collects registrations; [`GatewayBuilder::build`] freezes them into a
//! [`Gateway`] that can only dispatch and serve.
//!
//! Per request the gateway:
//! 1. Runs the pre-filters in ascending order, threading a [`FilterContext`]
//! 2. Answers with an envelope if a filter rejects
//! 3. Otherwise hands the final request and sink to the route table

use crate::envelope::write_envelope;
use crate::error::{GatewayError, RegistrationError};
use crate::filter::{ChainOutcome, Filter, FilterChain, FilterContext};
use crate::metrics::{GatewayMetrics, UNMATCHED_ROUTE};
use crate::route::{Route, RouteTable};
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Registration phase of the gateway
#[derive(Debug, Default)]
pub struct GatewayBuilder {
    chain: FilterChain,
    routes: RouteTable,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pre-filter; fails unless it is a [`Pre`](crate::filter::FilterPhase::Pre) filter
    pub fn add_pre_filter(&mut self, filter: Filter) -> Result<&mut Self, RegistrationError> {
        self.chain.add_pre_filter(filter)?;
        Ok(self)
    }

    /// Store a post-filter. It is never executed.
    pub fn add_post_filter(&mut self, filter: Filter) -> Result<&mut Self, RegistrationError> {
        self.chain.add_post_filter(filter)?;
        Ok(self)
    }

    /// Add a route; fails on an unsupported method or a bad/duplicate pattern
    pub fn add_route(&mut self, route: Route) -> Result<&mut Self, RegistrationError> {
        self.routes.add_route(route)?;
        Ok(self)
    }

    /// Record request counts and latencies into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Finish registration
    pub fn build(self) -> Gateway {
        info!(
            "Gateway ready: {} pre-filters {:?}, {} routes",
            self.chain.len(),
            self.chain.names(),
            self.routes.len()
        );
        Gateway {
            chain: self.chain,
            routes: self.routes,
            metrics: self.metrics,
        }
    }
}

/// Serving phase of the gateway; immutable and shared by all requests
#[derive(Debug)]
pub struct Gateway {
    chain: FilterChain,
    routes: RouteTable,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Dispatch one request through the chain and the route table
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let mut route = UNMATCHED_ROUTE;

        let response = match self.chain.run(FilterContext::new(req)) {
            ChainOutcome::Continue(ctx) => {
                let (mut request, sink, attributes) = ctx.into_parts();
                if let Some(pattern) = self.routes.match_pattern(request.uri().path()) {
                    route = pattern;
                }
                request.extensions_mut().extend(attributes);
                request.extensions_mut().insert(sink.clone());

                let mut response = self.routes.dispatch(request, &sink).await;
                sink.apply(&mut response);
                response
            }
            ChainOutcome::Rejected {
                filter,
                rejection,
                sink,
            } => {
                info!(
                    "{} {} rejected by filter '{}': {} {}",
                    method,
                    path,
                    filter,
                    rejection.status.as_u16(),
                    rejection.message
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(&filter);
                }
                write_envelope::<serde_json::Value>(
                    &sink,
                    &rejection.message,
                    rejection.status,
                    None,
                )
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_request(&method, route, response.status().as_u16(), start.elapsed());
        }
        response
    }

    /// Wrap the gateway in an axum router that sends every request to it
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::new(self))
    }

    /// Serve on an already bound listener until it fails
    pub async fn serve(self, listener: TcpListener) -> Result<(), GatewayError> {
        serve_router(listener, self.into_router(), std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn serve_with_shutdown<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        serve_router(listener, self.into_router(), shutdown).await
    }
}

/// Serve a router built from [`Gateway::into_router`], possibly with extra layers
pub async fn serve_router<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> Result<(), GatewayError>
where
    F: Future<Output = ()> + Send + 'static,
{
    match listener.local_addr() {
        Ok(addr) => info!("Starting gateway server on {}", addr),
        Err(e) => warn!("Starting gateway server on unknown address: {}", e),
    }

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Gateway server stopped");
    Ok(())
}

async fn gateway_handler(State(gateway): State<Arc<Gateway>>, req: Request<Body>) -> Response {
    gateway.handle(req).await
}
