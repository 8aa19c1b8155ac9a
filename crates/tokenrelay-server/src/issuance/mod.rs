//! Simulated downstream issuance stage.
//!
//! Stands in for the external system that actually mints tokens. It
//! consumes the request channel, runs each request through an opaque
//! [`Issuer`], and publishes the resulting response record on the
//! response channel. The engine never calls into this module directly;
//! the two sides only meet on the channels.
//!
//! ## Structure
//!
//! - [`issuer`] - The `Issuer` seam and the latency-simulating default.
//! - [`pool`] - Round-robin worker pool with acknowledged shutdown.
//! - [`worker`] - Per-worker issuance loop.
//! - [`processor`] - Request-channel drain feeding the pool.

pub mod issuer;
pub mod pool;
pub mod processor;
pub mod worker;

pub use issuer::{Issuer, SimulatedIssuer};
pub use pool::IssuancePool;
pub use processor::run_request_processor;
