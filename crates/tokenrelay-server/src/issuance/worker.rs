//! Per-worker issuance loop.
//!
//! Each worker owns a reference to the shared [`Issuer`] and the response
//! channel. It listens on its MPSC queue and processes [`WorkItem`]s until
//! a shutdown item is received.
//!
//! A failed issuance produces no response record at all: the requesting
//! caller simply times out, exactly as it would against a real backend
//! that swallowed the request.

use crate::issuance::issuer::Issuer;
use crate::transport::ResponseChannel;
use core::time::Duration;
use std::sync::Arc;
use std::time::SystemTime;
use tokenrelay_core::{codec, record::TokenRequest, record::TokenResponse};
use tokio::sync::{mpsc, oneshot};

/// Unit of work handed to an issuance worker.
pub enum WorkItem {
    /// Issue a token for one decoded request.
    Issue { request: TokenRequest },
    /// Stop the worker and acknowledge over the provided channel.
    Shutdown { ack: oneshot::Sender<()> },
}

/// Worker task processing [`WorkItem`]s until shut down.
///
/// Designed to be spawned as a Tokio task; exits when its queue closes or
/// a [`WorkItem::Shutdown`] arrives.
pub async fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<WorkItem>,
    issuer: Arc<dyn Issuer>,
    responses: Arc<dyn ResponseChannel>,
    validity: Duration,
) {
    tracing::debug!(worker_id, "issuance worker started");

    while let Some(item) = rx.recv().await {
        match item {
            WorkItem::Issue { request } => {
                handle_issue(worker_id, request, &*issuer, &*responses, validity).await;
            }
            WorkItem::Shutdown { ack } => {
                tracing::debug!(worker_id, "issuance worker received shutdown");
                if ack.send(()).is_err() {
                    tracing::error!(worker_id, "failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::debug!(worker_id, "issuance worker stopped");
}

async fn handle_issue(
    worker_id: usize,
    request: TokenRequest,
    issuer: &dyn Issuer,
    responses: &dyn ResponseChannel,
    validity: Duration,
) {
    let token = match issuer.issue(&request.user, &request.credential).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(
                worker_id,
                correlation_id = %request.correlation_id,
                user = %request.user,
                error = %e,
                "issuance failed, no response will be published"
            );
            return;
        }
    };

    let response =
        TokenResponse::from_request(&request).with_token(token, validity, SystemTime::now());

    let payload = match codec::encode_response(&response) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(worker_id, error = %e, "failed to encode response record");
            return;
        }
    };

    if let Err(e) = responses.publish(payload).await {
        tracing::warn!(
            worker_id,
            correlation_id = %response.correlation_id,
            error = %e,
            "failed to publish response record"
        );
        return;
    }

    tracing::info!(
        worker_id,
        correlation_id = %response.correlation_id,
        user = %response.user,
        "issued token"
    );
}
