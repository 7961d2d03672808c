//! Builds a ready-to-serve gateway from configuration

use crate::config::GatewayConfig;
use crate::filter::{AccessTokenFilter, RequestIdFilter};
use crate::gateway::Gateway;
use crate::health::{self, HealthChecker};
use crate::metrics::{self, GatewayMetrics};
use std::sync::Arc;
use tracing::info;

/// Register the configured filters and built-in routes
pub fn build_gateway(config: &GatewayConfig) -> anyhow::Result<Gateway> {
    let gateway_metrics = Arc::new(GatewayMetrics::new());
    let mut builder = Gateway::builder().with_metrics(gateway_metrics.clone());

    if let Some(filter) = RequestIdFilter::from_config(&config.request_id)? {
        builder.add_pre_filter(filter)?;
    }
    if let Some(filter) = AccessTokenFilter::from_config(&config.access_token)? {
        builder.add_pre_filter(filter)?;
    }

    if config.health.enabled {
        builder.add_route(health::route(
            Arc::new(HealthChecker::new()),
            &config.health.path,
        ))?;
        info!("Health endpoint enabled at {}", config.health.path);
    }
    if config.metrics.enabled {
        builder.add_route(metrics::route(gateway_metrics, &config.metrics.path))?;
        info!("Metrics endpoint enabled at {}", config.metrics.path);
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_gateway() {
        let gateway = build_gateway(&GatewayConfig::default()).unwrap();
        assert_eq!(gateway.chain().names(), vec!["request_id"]);
        assert_eq!(gateway.routes().len(), 2);
    }

    #[test]
    fn test_filters_follow_configured_order() {
        let config = GatewayConfig::parse(
            r#"
[access_token]
enabled = true
tokens = ["secret"]
order = 1

[request_id]
order = 2

[metrics]
enabled = false
"#,
        )
        .unwrap();

        let gateway = build_gateway(&config).unwrap();
        assert_eq!(gateway.chain().names(), vec!["access_token", "request_id"]);
        assert_eq!(gateway.routes().len(), 1);
    }

    #[test]
    fn test_invalid_header_name_fails() {
        let mut config = GatewayConfig::default();
        config.request_id.header_name = "bad header".to_string();
        assert!(build_gateway(&config).is_err());
    }
}
