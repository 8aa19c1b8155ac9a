//! Transport boundary for the request and response channels.
//!
//! The engine is transport-agnostic: it publishes encoded request records
//! keyed by user, and drains a stream of encoded response records. A
//! broker-backed implementation plugs in behind these traits; the
//! in-memory implementation in [`memory`] closes the loop for the demo
//! binary and the integration tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokenrelay_core::Result;

pub mod memory;

/// Outbound channel carrying encoded [`TokenRequest`] records.
///
/// `key` is the partition/ordering key: records sharing a key must be
/// observed downstream in submission order, while records with different
/// keys carry no relative ordering guarantee.
///
/// [`TokenRequest`]: tokenrelay_core::record::TokenRequest
#[async_trait]
pub trait RequestChannel: Send + Sync {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<()>;
}

/// Inbound channel carrying encoded [`TokenResponse`] records.
///
/// Every subscription is isolated per process instance: each subscriber
/// observes the full response stream independently (not as part of a
/// coordinated consumer group), so every replica can build a complete
/// local cache.
///
/// [`TokenResponse`]: tokenrelay_core::record::TokenResponse
#[async_trait]
pub trait ResponseChannel: Send + Sync {
    /// Opens an independent full-stream subscription.
    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>>;

    /// Publishes a response record; used by the issuance stage.
    async fn publish(&self, payload: Vec<u8>) -> Result<()>;
}
