//! Round-robin pool of issuance workers.
//!
//! Workers receive [`WorkItem`]s over bounded MPSC channels. Work is
//! distributed round-robin and the pool supports graceful, acknowledged
//! shutdown via a shared [`CancellationToken`].

use crate::issuance::issuer::Issuer;
use crate::issuance::worker::{WorkItem, worker_loop};
use crate::transport::ResponseChannel;
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokenrelay_core::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// How long to wait for each worker's shutdown acknowledgement.
const SHUTDOWN_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// A cooperative pool of issuance worker tasks.
pub struct IssuancePool {
    workers: Vec<mpsc::Sender<WorkItem>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
}

impl IssuancePool {
    /// Spawns `num_workers` worker tasks sharing one issuer and one
    /// response channel.
    ///
    /// Each worker's queue holds a single item: a worker picks up the
    /// next request only after finishing the previous one, keeping
    /// latency per request predictable.
    pub fn spawn(
        num_workers: usize,
        issuer: Arc<dyn Issuer>,
        responses: Arc<dyn ResponseChannel>,
        validity: Duration,
        shutdown_token: CancellationToken,
    ) -> Self {
        let mut workers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(1);
            workers.push(tx);
            tokio::spawn(worker_loop(
                worker_id,
                rx,
                Arc::clone(&issuer),
                Arc::clone(&responses),
                validity,
            ));
        }

        Self {
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token,
        }
    }

    /// Index of the next worker to receive work (round-robin).
    fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Sends a [`WorkItem`] to the next worker in the pool.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] once shutdown has begun.
    /// - [`Error::ChannelClosed`] if the chosen worker's queue is gone.
    pub async fn send_to_next_worker(&self, item: WorkItem) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let worker_idx = self.next_worker_index();
        self.workers[worker_idx]
            .send(item)
            .await
            .map_err(|_| Error::ChannelClosed {
                context: format!("issuance worker {worker_idx} queue closed"),
            })
    }

    /// Gracefully shuts down all workers.
    ///
    /// Cancels the shared token so no new work is accepted, then sends
    /// each worker a shutdown item and waits for acknowledgements.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down issuance pool");
        self.shutdown_token.cancel();

        let mut acks = Vec::with_capacity(self.workers.len());
        for (worker_id, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(e) = worker.send(WorkItem::Shutdown { ack: tx }).await {
                tracing::error!(worker_id, error = %e, "failed to send shutdown to worker");
            } else {
                acks.push((worker_id, rx));
            }
        }

        let waits = acks.into_iter().map(|(worker_id, rx)| async move {
            match timeout(SHUTDOWN_ACK_TIMEOUT, rx).await {
                Ok(Ok(())) => tracing::debug!(worker_id, "worker shutdown acknowledged"),
                Ok(Err(e)) => tracing::error!(worker_id, error = %e, "worker ack dropped"),
                Err(_) => tracing::warn!(worker_id, "worker shutdown timed out"),
            }
        });
        futures::future::join_all(waits).await;

        tracing::info!("issuance pool shutdown complete");
    }
}
