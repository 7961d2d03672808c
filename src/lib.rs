//! Filter Gateway - A minimal HTTP entry gateway
//!
//! This is a gateway service that provides:
//! - An ordered chain of pre-dispatch filters that may short-circuit requests
//! - A route table with GET/POST method guards
//! - A uniform JSON envelope for gateway-generated errors
//! - Prometheus metrics and a health endpoint
//! - Configurable multi-output logging

pub mod app;
pub mod config;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod route;

pub use config::GatewayConfig;
pub use envelope::{write_envelope, ResponseEnvelope};
pub use error::{GatewayError, RegistrationError};
pub use filter::{
    Filter, FilterCallback, FilterChain, FilterContext, FilterPhase, FilterRejection,
    FilterResult, ResponseSink,
};
pub use gateway::{Gateway, GatewayBuilder};
pub use route::{Route, RouteMethod, RouteTable};

/// Application result type
pub type Result<T> = anyhow::Result<T>;
