//! Response ingestion and cache maintenance tasks.
//!
//! Two long-lived tasks keep the local replica consistent:
//!
//! - The **response ingest** drains the external response channel,
//!   decodes each record, skips malformed ones, and republishes decoded
//!   responses onto the bus. It is the only bus publisher in the process.
//! - The **cache writer** holds one bus subscription and applies
//!   `put(event.user, event)` for every event it receives, the replayed
//!   sentinel included. It is the only cache writer in the process.
//!
//! Decode errors are contained here; bus saturation on the cache writer's
//! subscription is not, and propagates out as a fatal error.

use crate::engine::bus::{BusSubscription, ReplayBus};
use crate::engine::cache::ResponseCache;
use crate::transport::ResponseChannel;
use futures::StreamExt;
use std::sync::Arc;
use tokenrelay_core::{Error, Result, codec};
use tokio_util::sync::CancellationToken;

/// Drains the response channel and republishes decoded records onto the
/// bus until `shutdown` fires.
///
/// # Errors
///
/// Returns [`Error::ChannelClosed`] if the response stream ends while the
/// service is still running.
pub async fn run_response_ingest(
    channel: Arc<dyn ResponseChannel>,
    bus: Arc<ReplayBus>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut stream = channel.subscribe().await?;
    tracing::info!("response ingest started");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("response ingest stopping");
                return Ok(());
            }
            maybe_payload = stream.next() => {
                let Some(payload) = maybe_payload else {
                    return Err(Error::ChannelClosed {
                        context: "response channel stream ended".into(),
                    });
                };
                match codec::decode_response(&payload) {
                    Ok(response) => {
                        tracing::debug!(
                            correlation_id = %response.correlation_id,
                            user = %response.user,
                            "observed response record"
                        );
                        bus.publish(response);
                    }
                    Err(e) => {
                        // Contained: skip the record, keep the stream alive.
                        tracing::warn!(error = %e, "skipping malformed response record");
                    }
                }
            }
        }
    }
}

/// Applies every bus event to the cache until `shutdown` fires.
///
/// The subscription is created by the caller before any caller-visible
/// work starts, so the writer observes the stream from the beginning.
///
/// # Errors
///
/// Returns [`Error::BusSaturated`] if the subscription was overrun; the
/// cache can no longer be trusted to converge and the process should
/// terminate.
pub async fn run_cache_writer(
    mut subscription: BusSubscription,
    cache: Arc<ResponseCache>,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!("cache writer started");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("cache writer stopping");
                return Ok(());
            }
            received = subscription.recv() => {
                match received {
                    Ok(response) => cache.put(response),
                    Err(e @ Error::BusSaturated { .. }) => {
                        tracing::error!(error = %e, "cache writer overrun, local cache diverged");
                        return Err(e);
                    }
                    Err(_) => {
                        // Bus dropped; nothing left to observe.
                        return Ok(());
                    }
                }
            }
        }
    }
}
