//! Token request/response records and the cache freshness rule.
//!
//! A [`TokenRequest`] is created by the caller, dispatched downstream, and
//! discarded. A [`TokenResponse`] is created by the issuance stage and
//! flows back over the response channel; once constructed it is never
//! mutated, only replaced.
//!
//! Timestamps cross the wire as Unix epoch milliseconds so that records
//! remain comparable across process replicas regardless of platform clock
//! representation.

use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Converts a wall-clock instant into Unix epoch milliseconds.
///
/// Instants before the epoch clamp to zero; such clocks are already broken
/// enough that every cached entry deserves to read as expired.
pub fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A caller-assigned request for token issuance.
///
/// The correlation id links this outbound record to the response record
/// the issuance stage eventually publishes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Unique correlation id assigned by the caller.
    pub correlation_id: Uuid,
    /// User identifier for whom the token is requested. Doubles as the
    /// partition key on the request channel.
    pub user: String,
    /// Opaque credential material forwarded to the issuance stage.
    pub credential: String,
}

impl TokenRequest {
    /// Creates a request with a fresh v4 correlation id.
    pub fn new(user: impl Into<String>, credential: impl Into<String>) -> Self {
        Self::with_correlation_id(Uuid::new_v4(), user, credential)
    }

    /// Creates a request with an explicit correlation id.
    pub fn with_correlation_id(
        correlation_id: Uuid,
        user: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            user: user.into(),
            credential: credential.into(),
        }
    }
}

/// The issuance stage's answer to a [`TokenRequest`].
///
/// Invariant: `token` is present if and only if `expires_at` is present. A
/// response derived via [`TokenResponse::from_request`] carries neither
/// until [`TokenResponse::with_token`] stamps both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Correlation id copied from the originating request.
    pub correlation_id: Uuid,
    /// User identifier the token was issued for.
    pub user: String,
    /// The issued token, absent until issuance completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Expiry as Unix epoch milliseconds, absent until issuance completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl TokenResponse {
    /// The sentinel value seeding the broadcast bus's retained slot.
    ///
    /// Its expiry sits at the epoch, so it always reads as expired and can
    /// never satisfy a cache lookup or match a live correlation id.
    pub fn sentinel() -> Self {
        Self {
            correlation_id: Uuid::nil(),
            user: "user".into(),
            token: Some("token".into()),
            expires_at: Some(0),
        }
    }

    /// Derives an unissued response by copying user and correlation id
    /// from a request.
    pub fn from_request(request: &TokenRequest) -> Self {
        Self {
            correlation_id: request.correlation_id,
            user: request.user.clone(),
            token: None,
            expires_at: None,
        }
    }

    /// Stamps the issued token together with its expiry, keeping the
    /// token/expiry pairing invariant intact.
    pub fn with_token(mut self, token: impl Into<String>, validity: Duration, now: SystemTime) -> Self {
        self.token = Some(token.into());
        self.expires_at = Some(unix_millis(now) + validity.as_millis() as u64);
        self
    }

    /// Applies the freshness rule: a response is expired once
    /// `now + grace >= expires_at`.
    ///
    /// The grace period biases toward early refresh so callers never
    /// receive a token about to lapse. A response without an expiry (never
    /// issued) is always expired.
    pub fn is_expired(&self, grace: Duration, now: SystemTime) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= unix_millis(now) + grace.as_millis() as u64,
            None => true,
        }
    }

    /// Inverse of [`TokenResponse::is_expired`].
    pub fn is_fresh(&self, grace: Duration, now: SystemTime) -> bool {
        !self.is_expired(grace, now)
    }
}
