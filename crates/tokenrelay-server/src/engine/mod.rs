//! The correlation engine.
//!
//! This module contains the components that decouple a synchronous caller
//! from the asynchronous issuance stage:
//!
//! - [`bus`] - Replay-latest broadcast bus for response events.
//! - [`cache`] - TTL-aware per-user response cache.
//! - [`waiter`] - Per-request correlation wait with deadline.
//! - [`dispatch`] - Outbound request publishing.
//! - [`ingest`] - Response-channel drain and cache-writer tasks.
//! - [`coordinator`] - The `TokenIssuer` tying the above together.
//!
//! All shared state (cache + bus) is constructed once at startup and
//! passed by handle to every component that needs it; there are no global
//! registries.

pub mod bus;
pub mod cache;
pub mod coordinator;
pub mod dispatch;
pub mod ingest;
pub mod waiter;

pub use bus::{BusSubscription, ReplayBus};
pub use cache::ResponseCache;
pub use coordinator::TokenIssuer;
pub use dispatch::RequestDispatcher;
