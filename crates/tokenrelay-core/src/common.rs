//! Common definitions shared across the engine and the issuance stage.
//!
//! This module centralizes the wire contract for the token issuance
//! channels. It ensures that every component - the coordinator, the
//! response ingest, and the downstream issuance workers - interprets
//! records and timestamps identically.
//!
//! ## Modules
//!
//! - [`record`] - The `TokenRequest`/`TokenResponse` records and the
//!   freshness rule applied by the response cache.
//! - [`codec`] - JSON encoding/decoding of records for the channels.
//! - [`error`] - The unified error taxonomy.

pub mod codec;
pub mod error;
pub mod record;

pub use error::{Error, Result};
