//! # taskweave
//!
//! Asynchronous task orchestration on tokio.
//!
//! Provides timer-backed delays, cooperative cancellation, a single-flight
//! memoizing cache, fan-out/fan-in over spawned operations, sequential
//! continuation chains, and lazy async sequences, with tracing and
//! OpenTelemetry observability.

pub mod cache;
pub mod cancel;
pub mod chain;
pub mod config;
pub mod deferred;
pub mod error;
pub mod fanout;
pub mod http;
pub mod model;
pub mod sequence;
pub mod telemetry;
pub mod time;
pub mod workload;

pub use cache::{FetchCache, Lookup};
pub use cancel::CancellationSignal;
pub use chain::Chain;
pub use deferred::Deferred;
pub use error::{Error, Result};
pub use fanout::{FailurePolicy, when_all, when_all_with};
pub use sequence::{Generator, generate};
pub use time::{delay, delay_cancellable};
