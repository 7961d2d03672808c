//! Built-in pre-filters
//!
//! - Access token guard: rejects requests without a configured token
//! - Request ID: stamps every request and response with an identifier

use super::{Filter, FilterCallback, FilterContext, FilterRejection, FilterResult};
use crate::config::{AccessTokenConfig, RequestIdConfig};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use rand::Rng;

/// Rejects requests whose token header is not one of the configured tokens
#[derive(Debug, Clone)]
pub struct AccessTokenFilter {
    header_name: HeaderName,
    tokens: Vec<String>,
}

impl AccessTokenFilter {
    pub fn new(header_name: HeaderName, tokens: Vec<String>) -> Self {
        Self {
            header_name,
            tokens,
        }
    }

    /// Build the filter from configuration, or `None` when the guard is disabled
    pub fn from_config(config: &AccessTokenConfig) -> anyhow::Result<Option<Filter>> {
        if !config.enabled {
            return Ok(None);
        }
        let header_name: HeaderName = config.header_name.parse()?;
        let filter = Self::new(header_name, config.tokens.clone());
        Ok(Some(Filter::pre("access_token", config.order, filter)))
    }

    /// Check a presented token.
    ///
    /// An empty token list denies everything.
    pub fn validate_token(&self, token: &str) -> bool {
        !self.tokens.is_empty() && self.tokens.iter().any(|t| t == token)
    }
}

impl FilterCallback for AccessTokenFilter {
    fn call(&self, ctx: FilterContext) -> FilterResult {
        let token = ctx
            .request()
            .headers()
            .get(&self.header_name)
            .and_then(|value| value.to_str().ok());

        match token {
            Some(token) if self.validate_token(token) => Ok(ctx),
            _ => Err(FilterRejection::new(StatusCode::UNAUTHORIZED, "unauthorized")),
        }
    }
}

/// Identifier assigned to a request, available as a context attribute
/// and as a request extension once routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Reuses the incoming request ID header or generates one, then echoes it
/// on the response
#[derive(Debug, Clone)]
pub struct RequestIdFilter {
    header_name: HeaderName,
}

impl RequestIdFilter {
    pub fn new(header_name: HeaderName) -> Self {
        Self { header_name }
    }

    pub fn from_config(config: &RequestIdConfig) -> anyhow::Result<Option<Filter>> {
        if !config.enabled {
            return Ok(None);
        }
        let header_name: HeaderName = config.header_name.parse()?;
        Ok(Some(Filter::pre(
            "request_id",
            config.order,
            Self::new(header_name),
        )))
    }

    fn generate() -> String {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl FilterCallback for RequestIdFilter {
    fn call(&self, ctx: FilterContext) -> FilterResult {
        let incoming = ctx
            .request()
            .headers()
            .get(&self.header_name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let id = incoming.unwrap_or_else(Self::generate);

        let value = HeaderValue::from_str(&id).map_err(|_| {
            FilterRejection::new(StatusCode::BAD_REQUEST, "invalid request id")
        })?;

        let header_name = self.header_name.clone();
        let sink_header = header_name.clone();
        let sink_value = value.clone();
        Ok(ctx
            .map_request(move |mut request| {
                request.headers_mut().insert(header_name, value);
                request
            })
            .map_sink(move |sink| sink.with_header(sink_header, sink_value))
            .with_attribute(RequestId(id)))
    }
}
