//! Error types for the token issuance service.
//!
//! This module defines the central `Error` enum, which captures every
//! fallible boundary in the system. Callers of the coordinator can rely on
//! the distinction between [`Error::DispatchFailed`] ("never sent") and
//! [`Error::TimedOut`] ("sent but no answer arrived in time").
//!
//! ## Error Cases
//! - `MalformedMessage`: A channel payload failed to decode. Contained at
//!   the point of ingestion; the record is skipped and the stream
//!   continues.
//! - `DispatchFailed`: Publishing a request to the request channel failed.
//!   Surfaced to the immediate caller.
//! - `TimedOut`: No response with the expected correlation id arrived
//!   before the deadline. Surfaced to the immediate caller.
//! - `BusSaturated`: A bus subscriber could not keep up with the publish
//!   rate. The bus deliberately has no backpressure handling, so this is
//!   fatal to the process.
//! - `ChannelClosed`: An internal or external channel shut down under a
//!   component that still needed it.
//! - `ServiceShutdown`: Work arrived while the service was shutting down.
//! - `InvalidConfig`: The runtime configuration failed validation.

use uuid::Uuid;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the token issuance service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// A channel payload failed to decode; the single record is skipped.
    #[error("malformed message: {context}")]
    MalformedMessage { context: String },

    /// Publishing to the request channel failed; the request was never sent.
    #[error("request dispatch failed: {context}")]
    DispatchFailed { context: String },

    /// No matching response was observed before the deadline.
    #[error("timed out waiting for response with correlation id {correlation_id}")]
    TimedOut { correlation_id: Uuid },

    /// A bus subscriber fell behind the publisher. Fatal by design: the
    /// bus intentionally omits backpressure handling.
    #[error("broadcast bus saturated: {context}")]
    BusSaturated { context: String },

    /// Internal channel send/receive failure (e.g., closed endpoint).
    #[error("channel closed: {context}")]
    ChannelClosed { context: String },

    /// The downstream issuance backend reported a failure. No response
    /// record is produced; the caller observes a timeout.
    #[error("issuance failed: {context}")]
    Issuance { context: String },

    /// The service is in the process of shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,

    /// The runtime configuration was rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// True for conditions the process must not attempt to contain.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BusSaturated { .. })
    }
}
