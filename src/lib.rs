//! Library surface for the dnstap telemetry pipeline. `main.rs` is a thin
//! binary wrapper over these modules; integration tests and anything else
//! that needs to drive the pipeline or its HTTP surface without going
//! through a full process spawn uses this crate directly.

pub mod config;
pub mod correlate;
pub mod enrich;
pub mod envelope;
pub mod errors;
pub mod ingress;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod web;
pub mod wire;
