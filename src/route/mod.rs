//! Route table
//!
//! Maps URL patterns to handlers guarded by a single HTTP method:
//! - Patterns ending in `/` match their whole subtree
//! - Other patterns match only the exact path
//! - The longest matching pattern wins

use crate::envelope::error_envelope;
use crate::error::RegistrationError;
use crate::filter::ResponseSink;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Boxed future returned by a route handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased route handler
pub type RouteHandler = Arc<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>;

/// Methods a route can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    Get,
    Post,
}

impl RouteMethod {
    pub fn as_method(&self) -> Method {
        match self {
            RouteMethod::Get => Method::GET,
            RouteMethod::Post => Method::POST,
        }
    }

    /// Body of the 405 answer for this route
    fn mismatch_message(&self) -> &'static str {
        match self {
            RouteMethod::Get => "use GET method",
            RouteMethod::Post => "use POST method",
        }
    }
}

impl FromStr for RouteMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RouteMethod::Get),
            "POST" => Ok(RouteMethod::Post),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Get => write!(f, "GET"),
            RouteMethod::Post => write!(f, "POST"),
        }
    }
}

/// A route registration request
#[derive(Clone)]
pub struct Route {
    pub pattern: String,
    /// Method name as given; normalized on registration
    pub method: String,
    pub handler: RouteHandler,
}

impl Route {
    pub fn new<H, Fut, R>(pattern: impl Into<String>, method: impl Into<String>, handler: H) -> Self
    where
        H: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        let handler: RouteHandler = Arc::new(move |req: Request<Body>| -> HandlerFuture {
            let fut = handler(req);
            Box::pin(async move { fut.await.into_response() })
        });
        Self {
            pattern: pattern.into(),
            method: method.into(),
            handler,
        }
    }

    pub fn get<H, Fut, R>(pattern: impl Into<String>, handler: H) -> Self
    where
        H: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        Self::new(pattern, "GET", handler)
    }

    pub fn post<H, Fut, R>(pattern: impl Into<String>, handler: H) -> Self
    where
        H: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        Self::new(pattern, "POST", handler)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .finish()
    }
}

/// A registered route with its method guard
#[derive(Clone)]
struct GuardedRoute {
    method: RouteMethod,
    handler: RouteHandler,
}

impl GuardedRoute {
    async fn call(&self, req: Request<Body>, sink: &ResponseSink) -> Response {
        if req.method() != self.method.as_method() {
            return error_envelope(
                sink,
                self.method.mismatch_message(),
                StatusCode::METHOD_NOT_ALLOWED,
            );
        }
        (self.handler)(req).await
    }
}

/// Pattern to guarded-handler mapping
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, GuardedRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route behind its method guard
    pub fn add_route(&mut self, route: Route) -> Result<(), RegistrationError> {
        let method: RouteMethod =
            route
                .method
                .parse()
                .map_err(|method| RegistrationError::UnsupportedMethod {
                    pattern: route.pattern.clone(),
                    method,
                })?;

        if !route.pattern.starts_with('/') {
            return Err(RegistrationError::InvalidPattern(route.pattern));
        }
        if self.routes.contains_key(&route.pattern) {
            return Err(RegistrationError::DuplicatePattern(route.pattern));
        }

        debug!(pattern = %route.pattern, method = %method, "registered route");
        self.routes.insert(
            route.pattern,
            GuardedRoute {
                method,
                handler: route.handler,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered patterns with their methods, sorted by pattern
    pub fn patterns(&self) -> Vec<(&str, RouteMethod)> {
        let mut patterns: Vec<_> = self
            .routes
            .iter()
            .map(|(pattern, route)| (pattern.as_str(), route.method))
            .collect();
        patterns.sort_by_key(|(pattern, _)| *pattern);
        patterns
    }

    /// Most specific pattern matching `path`
    pub fn match_pattern(&self, path: &str) -> Option<&str> {
        self.routes
            .keys()
            .filter(|pattern| pattern_matches(pattern, path))
            .max_by_key(|pattern| pattern.len())
            .map(String::as_str)
    }

    /// Route a request that has passed the filter chain
    pub async fn dispatch(&self, req: Request<Body>, sink: &ResponseSink) -> Response {
        let route = self
            .match_pattern(req.uri().path())
            .and_then(|pattern| self.routes.get(pattern));

        match route {
            Some(route) => route.call(req, sink).await,
            None => error_envelope(sink, "404 page not found", StatusCode::NOT_FOUND),
        }
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.patterns()).finish()
    }
}

/// Check if `path` is covered by `pattern`
fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern.ends_with('/') {
        path.starts_with(pattern)
    } else {
        path == pattern
    }
}
