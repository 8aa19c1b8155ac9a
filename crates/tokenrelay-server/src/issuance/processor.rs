//! Request-channel drain feeding the issuance pool.
//!
//! One long-lived task consumes keyed request records, decodes them, and
//! hands each decoded request to the next worker. Malformed records are
//! logged and skipped; the drain continues. Because the drain is the sole
//! consumer of the request channel, records sharing a key reach the pool
//! in submission order.

use crate::issuance::pool::IssuancePool;
use crate::issuance::worker::WorkItem;
use crate::transport::memory::RequestRecord;
use std::sync::Arc;
use tokenrelay_core::{Error, Result, codec};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Drains `requests` into `pool` until `shutdown` fires or the channel
/// closes.
pub async fn run_request_processor(
    mut requests: mpsc::Receiver<RequestRecord>,
    pool: Arc<IssuancePool>,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!("request processor started");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("request processor stopping");
                return Ok(());
            }
            maybe_record = requests.recv() => {
                let Some(record) = maybe_record else {
                    tracing::info!("request channel closed, processor stopping");
                    return Ok(());
                };
                match handle_record(record, &pool).await {
                    Ok(()) => {}
                    // Shutdown raced the drain; stop quietly.
                    Err(Error::ServiceShutdown) => return Ok(()),
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

async fn handle_record(record: RequestRecord, pool: &IssuancePool) -> Result<()> {
    let request = match codec::decode_request(&record.payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(key = %record.key, error = %e, "skipping malformed request record");
            return Ok(());
        }
    };

    tracing::debug!(
        key = %record.key,
        correlation_id = %request.correlation_id,
        "processing token request"
    );

    match pool.send_to_next_worker(WorkItem::Issue { request }).await {
        Ok(()) => Ok(()),
        Err(Error::ServiceShutdown) => Err(Error::ServiceShutdown),
        Err(e) => {
            tracing::error!(error = %e, "failed to hand request to issuance pool");
            Err(e)
        }
    }
}
