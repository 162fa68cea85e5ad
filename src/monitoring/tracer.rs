/*!
 * Structured Tracing
 * Subscriber setup and per-operation spans for allocator instances
 *
 * Library code logs through the `log` facade; the subscriber installed here
 * picks those records up next to the spans below.
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Install the global subscriber
///
/// Environment variables:
/// - RUST_LOG: log level (default: info)
/// - RAWMEM_TRACE_JSON: JSON output when `1` or `true`
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("RAWMEM_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("Tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .init();
        info!("Tracing initialized");
    }
}

/// Span around one operation on a named allocator
pub struct AllocatorSpan {
    span: tracing::Span,
    start: Instant,
    operation: &'static str,
}

impl AllocatorSpan {
    pub fn new(allocator: &str, strategy: &str, operation: &'static str) -> Self {
        let span = span!(
            Level::DEBUG,
            "allocator",
            name = allocator,
            strategy = strategy,
            operation = operation,
            size = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            operation,
        }
    }

    pub fn record_size(&self, size: usize) {
        self.span.record("size", size);
    }

    /// Record the outcome of the wrapped call
    pub fn record_result<T, E: std::fmt::Display>(&self, result: &Result<T, E>) {
        match result {
            Ok(_) => {
                self.span.record("result", "success");
            }
            Err(e) => {
                self.span.record("result", "error");
                self.span.record("error", tracing::field::display(e));
            }
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for AllocatorSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration.as_millis() > 10 {
            warn!(
                operation = self.operation,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow allocator operation"
            );
        } else {
            debug!(operation = self.operation, "allocator operation completed");
        }
    }
}

/// Helper to open an allocator span
#[inline]
pub fn span_allocator(allocator: &str, strategy: &str, operation: &'static str) -> AllocatorSpan {
    AllocatorSpan::new(allocator, strategy, operation)
}
