//! Live web origin discovery.
//!
//! Takes a list of hostnames and finds which of them answer over HTTPS
//! and/or plain HTTP with a 2xx or 3xx status.
//!
//! ```text
//!  hostnames ──▶ https pool ──▶ http pool
//!                    │              │
//!                    └──────┬───────┘
//!                           ▼
//!                       aggregator ──▶ result sink
//! ```
//!
//! Every hostname visits the HTTPS pool and then the HTTP pool, whatever the
//! HTTPS outcome was. Both pools hand live URLs to a single aggregator which
//! owns the result sink.

pub mod checker;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod source;

pub use checker::{LivenessChecker, Probe, ProbeOutcome, Scheme};
pub use config::{Cli, ProbeConfig};
pub use pipeline::{Pipeline, RunSummary};
