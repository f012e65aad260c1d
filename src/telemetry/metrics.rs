//! Metric instrument factories for taskweave.
//!
//! Instruments come from the globally registered `MeterProvider`. Without an
//! OTLP endpoint that provider is the no-op default, so recording is free.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("taskweave")
}

/// Counter: deferred operations spawned.
/// Labels: `kind`.
pub fn operations_started() -> Counter<u64> {
    meter()
        .u64_counter("taskweave.operation.started")
        .with_description("Number of deferred operations spawned")
        .build()
}

/// Counter: deferred operations that reached a terminal state.
/// Labels: `kind`, `state` ("completed" | "failed" | "cancelled").
pub fn operations_finished() -> Counter<u64> {
    meter()
        .u64_counter("taskweave.operation.finished")
        .with_description("Number of deferred operations settled")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `kind`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("taskweave.operation.duration_ms")
        .with_description("Deferred operation duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: cache lookups.
/// Labels: `outcome` ("hit" | "joined" | "miss").
pub fn cache_lookups() -> Counter<u64> {
    meter()
        .u64_counter("taskweave.cache.lookups")
        .with_description("Number of cache lookups by outcome")
        .build()
}

/// Counter: fetches actually executed by the cache.
/// Labels: `result` ("ok" | "error").
pub fn cache_fetches() -> Counter<u64> {
    meter()
        .u64_counter("taskweave.cache.fetches")
        .with_description("Number of cache fetches executed")
        .build()
}

/// Counter: cancellation signals requested.
pub fn cancellations_requested() -> Counter<u64> {
    meter()
        .u64_counter("taskweave.cancel.requested")
        .with_description("Number of cancellation signals set")
        .build()
}

/// Histogram: number of operations per fan-out batch.
pub fn fanout_batch_size() -> Histogram<u64> {
    meter()
        .u64_histogram("taskweave.fanout.batch_size")
        .with_description("Operations submitted per fan-out batch")
        .build()
}
