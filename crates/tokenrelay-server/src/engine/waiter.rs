//! Per-request correlation wait.
//!
//! Each caller that misses the cache owns an independent subscription to
//! the bus for the duration of its call. The waiter consumes the event
//! sequence - replayed retained value first - until the first event whose
//! correlation id matches the target, then tears the subscription down.
//! If the deadline elapses first, the subscription is torn down and the
//! caller sees [`Error::TimedOut`]. Either way the subscriber slot is
//! released, bounding subscriber growth to the number of in-flight calls.

use crate::engine::bus::BusSubscription;
use core::time::Duration;
use tokenrelay_core::{Error, Result, record::TokenResponse};
use uuid::Uuid;

/// Consumes `subscription` until the first event matching
/// `correlation_id`, or fails once `deadline` has elapsed.
///
/// Only the first match counts; duplicate events with the same
/// correlation id published later are never seen by this waiter because
/// the subscription is dropped on return.
pub async fn await_response(
    mut subscription: BusSubscription,
    correlation_id: Uuid,
    deadline: Duration,
) -> Result<TokenResponse> {
    let matched = async {
        loop {
            let response = subscription.recv().await?;
            if response.correlation_id == correlation_id {
                return Ok(response);
            }
            tracing::trace!(
                observed = %response.correlation_id,
                target = %correlation_id,
                "ignoring non-matching response event"
            );
        }
    };

    match tokio::time::timeout(deadline, matched).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(%correlation_id, ?deadline, "correlation wait timed out");
            Err(Error::TimedOut { correlation_id })
        }
    }
}
