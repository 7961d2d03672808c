//! Filter module
//!
//! A filter intercepts a request before it reaches the route table. Each
//! filter receives a [`FilterContext`] and either hands back a (possibly
//! rewritten) context for the next filter, or rejects the request with a
//! [`FilterRejection`] that short-circuits the chain.

mod builtin;
mod chain;

pub use builtin::{AccessTokenFilter, RequestId, RequestIdFilter};
pub use chain::{ChainOutcome, FilterChain};

use axum::body::Body;
use axum::http::{Extensions, HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::Response;
use std::fmt;
use std::sync::Arc;

/// When a filter runs relative to route dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    /// Runs before the request is routed
    Pre,
    /// Declared for after dispatch; stored but never executed
    Post,
}

impl fmt::Display for FilterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPhase::Pre => write!(f, "pre"),
            FilterPhase::Post => write!(f, "post"),
        }
    }
}

/// Pending decorations for the outgoing response.
///
/// Filters replace the sink they were given with a decorated one; whatever
/// sink is current when the gateway answers is applied to that answer,
/// whether it comes from a handler or from a rejection envelope.
#[derive(Debug, Clone, Default)]
pub struct ResponseSink {
    headers: HeaderMap,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a sink that also sets `name: value` on the response
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Copy the sink's headers onto a response.
    ///
    /// Headers the response already carries are left untouched.
    pub fn apply(&self, response: &mut Response) {
        for name in self.headers.keys() {
            if response.headers().contains_key(name) {
                continue;
            }
            for value in self.headers.get_all(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
    }
}

/// The value threaded through the filter chain
pub struct FilterContext {
    request: Request<Body>,
    sink: ResponseSink,
    attributes: Extensions,
}

impl FilterContext {
    /// Start a context for a freshly received request
    pub fn new(request: Request<Body>) -> Self {
        Self {
            request,
            sink: ResponseSink::new(),
            attributes: Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    pub fn sink(&self) -> &ResponseSink {
        &self.sink
    }

    /// Values derived by earlier filters
    pub fn attributes(&self) -> &Extensions {
        &self.attributes
    }

    pub fn attribute<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.attributes.get::<T>()
    }

    pub fn with_sink(mut self, sink: ResponseSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn map_sink(self, f: impl FnOnce(ResponseSink) -> ResponseSink) -> Self {
        let Self {
            request,
            sink,
            attributes,
        } = self;
        Self {
            request,
            sink: f(sink),
            attributes,
        }
    }

    pub fn map_request(self, f: impl FnOnce(Request<Body>) -> Request<Body>) -> Self {
        let Self {
            request,
            sink,
            attributes,
        } = self;
        Self {
            request: f(request),
            sink,
            attributes,
        }
    }

    pub fn with_attribute<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.attributes.insert(value);
        self
    }

    pub fn into_parts(self) -> (Request<Body>, ResponseSink, Extensions) {
        (self.request, self.sink, self.attributes)
    }
}

impl fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("sink", &self.sink)
            .finish()
    }
}

/// A filter's refusal to let a request through
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FilterRejection {
    pub status: StatusCode,
    pub message: String,
}

impl FilterRejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Outcome of a single filter invocation
pub type FilterResult = Result<FilterContext, FilterRejection>;

/// Callback run by a filter.
///
/// Implemented for any `Fn(FilterContext) -> FilterResult`, so plain
/// closures can be registered directly.
pub trait FilterCallback: Send + Sync {
    fn call(&self, ctx: FilterContext) -> FilterResult;
}

impl<F> FilterCallback for F
where
    F: Fn(FilterContext) -> FilterResult + Send + Sync,
{
    fn call(&self, ctx: FilterContext) -> FilterResult {
        self(ctx)
    }
}

/// An immutable interceptor registration
#[derive(Clone)]
pub struct Filter {
    name: String,
    phase: FilterPhase,
    order: u32,
    callback: Arc<dyn FilterCallback>,
}

impl Filter {
    pub fn new(
        name: impl Into<String>,
        phase: FilterPhase,
        order: u32,
        callback: impl FilterCallback + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            phase,
            order,
            callback: Arc::new(callback),
        }
    }

    /// Shorthand for a [`FilterPhase::Pre`] filter
    pub fn pre(
        name: impl Into<String>,
        order: u32,
        callback: impl FilterCallback + 'static,
    ) -> Self {
        Self::new(name, FilterPhase::Pre, order, callback)
    }

    /// Shorthand for a [`FilterPhase::Post`] filter
    pub fn post(
        name: impl Into<String>,
        order: u32,
        callback: impl FilterCallback + 'static,
    ) -> Self {
        Self::new(name, FilterPhase::Post, order, callback)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn apply(&self, ctx: FilterContext) -> FilterResult {
        self.callback.call(ctx)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("order", &self.order)
            .finish()
    }
}
