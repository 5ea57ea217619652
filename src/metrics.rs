// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {
    Count,
    Seconds,
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = $value;
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {{
        let _ = $value;
        $(let _ = (&$label, &$label_value);)*
    }};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {{
        let _ = $unit;
    }};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {{
        let _ = $unit;
    }};
    ($name:expr, $desc:expr) => {};
}

// Re-export macros for use in this module when observability is disabled
#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_histogram, histogram};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "yield_pools_emitted_total",
        Unit::Count,
        "Pool records emitted, labeled by pool kind."
    );
    describe_counter!(
        "yield_pools_dropped_non_finite_total",
        Unit::Count,
        "Pool records dropped by the finiteness gate."
    );
    describe_counter!(
        "yield_vault_unwrap_failures_total",
        Unit::Count,
        "Vaults whose LP position could not be unwrapped."
    );
    describe_counter!(
        "yield_upstream_failures_total",
        Unit::Count,
        "Failed upstream fetches, labeled by source (subgraph, prices)."
    );
    describe_histogram!(
        "yield_pipeline_duration_seconds",
        Unit::Seconds,
        "Wall time of one get_pools_data run."
    );
}

// --- Helper functions to update metrics ---

pub fn increment_pools_emitted(kind: &str, count: u64) {
    counter!("yield_pools_emitted_total", count, "kind" => kind.to_string());
}

pub fn increment_pools_dropped(count: u64) {
    counter!("yield_pools_dropped_non_finite_total", count);
}

pub fn increment_unwrap_failures() {
    counter!("yield_vault_unwrap_failures_total", 1);
}

pub fn increment_upstream_failure(source: &'static str) {
    counter!("yield_upstream_failures_total", 1, "source" => source);
}

pub fn record_pipeline_duration(duration: std::time::Duration) {
    histogram!("yield_pipeline_duration_seconds", duration.as_secs_f64());
}
