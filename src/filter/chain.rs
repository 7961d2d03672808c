//! Ordered pre-filter chain

use super::{Filter, FilterContext, FilterPhase, FilterRejection, ResponseSink};
use crate::error::RegistrationError;
use tracing::{debug, warn};

/// Result of driving a request through the chain
#[derive(Debug)]
pub enum ChainOutcome {
    /// Every filter accepted; carries the final context
    Continue(FilterContext),
    /// A filter rejected the request
    Rejected {
        /// Name of the rejecting filter
        filter: String,
        rejection: FilterRejection,
        /// Sink as it stood when the rejecting filter was called
        sink: ResponseSink,
    },
}

/// Pre-filters kept in ascending `order`, stable on ties.
///
/// Post-filters are accepted into storage but never run.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    pre_filters: Vec<Filter>,
    post_filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-filter and restore ascending order
    pub fn add_pre_filter(&mut self, filter: Filter) -> Result<(), RegistrationError> {
        if filter.phase() != FilterPhase::Pre {
            return Err(RegistrationError::WrongPhase {
                name: filter.name().to_string(),
                expected: FilterPhase::Pre,
                actual: filter.phase(),
            });
        }
        debug!(
            filter = filter.name(),
            order = filter.order(),
            "registered pre-filter"
        );
        self.pre_filters.push(filter);
        // sort_by_key is stable: equal orders keep insertion sequence
        self.pre_filters.sort_by_key(Filter::order);
        Ok(())
    }

    /// Store a post-filter. Dispatch does not execute post-filters.
    pub fn add_post_filter(&mut self, filter: Filter) -> Result<(), RegistrationError> {
        if filter.phase() != FilterPhase::Post {
            return Err(RegistrationError::WrongPhase {
                name: filter.name().to_string(),
                expected: FilterPhase::Post,
                actual: filter.phase(),
            });
        }
        warn!(
            "Post-filter '{}' registered; post-filters are stored but not executed",
            filter.name()
        );
        self.post_filters.push(filter);
        self.post_filters.sort_by_key(Filter::order);
        Ok(())
    }

    /// Pre-filters in dispatch order
    pub fn pre_filters(&self) -> &[Filter] {
        &self.pre_filters
    }

    pub fn post_filters(&self) -> &[Filter] {
        &self.post_filters
    }

    pub fn len(&self) -> usize {
        self.pre_filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre_filters.is_empty()
    }

    /// Names of the pre-filters in dispatch order
    pub fn names(&self) -> Vec<&str> {
        self.pre_filters.iter().map(Filter::name).collect()
    }

    /// Run every pre-filter in order, stopping at the first rejection
    pub fn run(&self, mut ctx: FilterContext) -> ChainOutcome {
        for filter in &self.pre_filters {
            let sink = ctx.sink().clone();
            match filter.apply(ctx) {
                Ok(next) => ctx = next,
                Err(rejection) => {
                    debug!(
                        filter = filter.name(),
                        status = rejection.status.as_u16(),
                        "request rejected by filter"
                    );
                    return ChainOutcome::Rejected {
                        filter: filter.name().to_string(),
                        rejection,
                        sink,
                    };
                }
            }
        }
        ChainOutcome::Continue(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterResult;
    use axum::body::Body;
    use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn ctx() -> FilterContext {
        FilterContext::new(Request::builder().uri("/").body(Body::empty()).unwrap())
    }

    /// Filter that appends its name to a shared log and passes the request on
    fn recording(name: &'static str, order: u32, log: Arc<Mutex<Vec<&'static str>>>) -> Filter {
        Filter::pre(name, order, move |ctx: FilterContext| -> FilterResult {
            log.lock().unwrap().push(name);
            Ok(ctx)
        })
    }

    #[test]
    fn test_dispatch_order_is_ascending() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = FilterChain::new();
        chain.add_pre_filter(recording("three", 3, log.clone())).unwrap();
        chain.add_pre_filter(recording("one", 1, log.clone())).unwrap();
        chain.add_pre_filter(recording("two", 2, log.clone())).unwrap();

        assert_eq!(chain.names(), vec!["one", "two", "three"]);
        assert!(matches!(chain.run(ctx()), ChainOutcome::Continue(_)));
        assert_eq!(*log.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_equal_orders_keep_insertion_sequence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = FilterChain::new();
        chain.add_pre_filter(recording("a", 5, log.clone())).unwrap();
        chain.add_pre_filter(recording("b", 1, log.clone())).unwrap();
        chain.add_pre_filter(recording("c", 5, log.clone())).unwrap();
        chain.add_pre_filter(recording("d", 1, log.clone())).unwrap();
        chain.add_pre_filter(recording("e", 5, log.clone())).unwrap();

        assert_eq!(chain.names(), vec!["b", "d", "a", "c", "e"]);
    }

    #[test]
    fn test_rejection_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = FilterChain::new();
        for order in 1..=4u32 {
            let calls = calls.clone();
            chain
                .add_pre_filter(Filter::pre(
                    format!("f{}", order),
                    order,
                    move |ctx: FilterContext| -> FilterResult {
                        calls.fetch_add(1, Ordering::SeqCst);
                        if order == 2 {
                            Err(FilterRejection::new(StatusCode::UNAUTHORIZED, "unauthorized"))
                        } else {
                            Ok(ctx)
                        }
                    },
                ))
                .unwrap();
        }

        match chain.run(ctx()) {
            ChainOutcome::Rejected {
                filter, rejection, ..
            } => {
                assert_eq!(filter, "f2");
                assert_eq!(rejection.status, StatusCode::UNAUTHORIZED);
                assert_eq!(rejection.message, "unauthorized");
            }
            ChainOutcome::Continue(_) => panic!("expected rejection"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejection_keeps_sink_from_earlier_filters() {
        let mut chain = FilterChain::new();
        chain
            .add_pre_filter(Filter::pre("stamp", 1, |ctx: FilterContext| -> FilterResult {
                Ok(ctx.map_sink(|sink| {
                    sink.with_header(
                        HeaderName::from_static("x-stamp"),
                        HeaderValue::from_static("1"),
                    )
                }))
            }))
            .unwrap();
        chain
            .add_pre_filter(Filter::pre("deny", 2, |ctx: FilterContext| -> FilterResult {
                let _ = ctx.map_sink(|sink| {
                    sink.with_header(
                        HeaderName::from_static("x-deny"),
                        HeaderValue::from_static("1"),
                    )
                });
                Err(FilterRejection::new(StatusCode::FORBIDDEN, "denied"))
            }))
            .unwrap();

        match chain.run(ctx()) {
            ChainOutcome::Rejected { sink, .. } => {
                assert!(sink.headers().contains_key("x-stamp"));
                assert!(!sink.headers().contains_key("x-deny"));
            }
            ChainOutcome::Continue(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_wrong_phase_is_rejected() {
        let mut chain = FilterChain::new();
        let post = Filter::post("late", 1, |ctx: FilterContext| -> FilterResult { Ok(ctx) });

        let err = chain.add_pre_filter(post.clone()).unwrap_err();
        assert!(matches!(err, RegistrationError::WrongPhase { .. }));
        assert!(chain.is_empty());

        let pre = Filter::pre("early", 1, |ctx: FilterContext| -> FilterResult { Ok(ctx) });
        assert!(chain.add_post_filter(pre).is_err());
    }

    #[test]
    fn test_post_filters_are_never_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut chain = FilterChain::new();
        chain
            .add_post_filter(Filter::post(
                "late",
                1,
                move |ctx: FilterContext| -> FilterResult {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(ctx)
                },
            ))
            .unwrap();

        assert_eq!(chain.post_filters().len(), 1);
        assert!(chain.is_empty());
        assert!(matches!(chain.run(ctx()), ChainOutcome::Continue(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
