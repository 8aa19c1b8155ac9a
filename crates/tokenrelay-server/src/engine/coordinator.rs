//! The issuer coordinator.
//!
//! `TokenIssuer` is the caller-facing entry point tying the engine
//! together: cache lookup, then on a miss dispatch plus correlation wait.
//!
//! State machine per call:
//!
//! ```text
//! Start -> CacheHit                         (success)
//! Start -> CacheMiss -> Dispatching -> DispatchFailed   (failure)
//!                                   -> Waiting -> Matched   (success)
//!                                              -> TimedOut  (failure)
//! ```
//!
//! The waiter and the cache-writing bus subscription run independently: a
//! resolved wait does not touch the cache, and cache freshness for later
//! callers depends solely on the ingest pipeline having observed the
//! event. Concurrent misses for the same user are deliberately not
//! collapsed; each caller dispatches and waits on its own.

use crate::engine::bus::ReplayBus;
use crate::engine::cache::ResponseCache;
use crate::engine::dispatch::RequestDispatcher;
use crate::engine::waiter::await_response;
use core::time::Duration;
use std::sync::Arc;
use tokenrelay_core::{
    Result,
    record::{TokenRequest, TokenResponse},
};

/// Caller-facing coordinator for token issuance.
#[derive(Clone)]
pub struct TokenIssuer {
    cache: Arc<ResponseCache>,
    bus: Arc<ReplayBus>,
    dispatcher: RequestDispatcher,
    wait_timeout: Duration,
}

impl TokenIssuer {
    pub fn new(
        cache: Arc<ResponseCache>,
        bus: Arc<ReplayBus>,
        dispatcher: RequestDispatcher,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            bus,
            dispatcher,
            wait_timeout,
        }
    }

    /// Issues a token for `request`, short-circuiting on a fresh cached
    /// response for the same user.
    ///
    /// # Errors
    ///
    /// - [`Error::DispatchFailed`] if the request could not be published;
    ///   no wait is started.
    /// - [`Error::TimedOut`] if no response with the request's correlation
    ///   id arrived within the wait timeout.
    /// - [`Error::BusSaturated`] if this caller's bus subscription was
    ///   overrun while waiting.
    ///
    /// [`Error::DispatchFailed`]: tokenrelay_core::Error::DispatchFailed
    /// [`Error::TimedOut`]: tokenrelay_core::Error::TimedOut
    /// [`Error::BusSaturated`]: tokenrelay_core::Error::BusSaturated
    #[tracing::instrument(skip_all, fields(user = %request.user, correlation_id = %request.correlation_id))]
    pub async fn issue(&self, request: TokenRequest) -> Result<TokenResponse> {
        if let Some(cached) = self.cache.get(&request.user) {
            tracing::debug!("serving cached response");
            return Ok(cached);
        }

        // Subscribe before dispatching so a response landing between the
        // send and the wait is replayed rather than missed.
        let subscription = self.bus.subscribe();
        self.dispatcher.dispatch(&request).await?;

        await_response(subscription, request.correlation_id, self.wait_timeout).await
    }
}
