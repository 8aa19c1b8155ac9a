//! Outbound request publishing.
//!
//! The dispatcher encodes a request and hands it to the request channel
//! keyed by user, so a partitioned downstream observes one user's
//! requests in submission order. Any failure on this path means the
//! request was never sent, which callers must be able to tell apart from
//! a timeout; everything here therefore surfaces as
//! [`Error::DispatchFailed`].

use crate::transport::RequestChannel;
use std::sync::Arc;
use tokenrelay_core::{Error, Result, codec, record::TokenRequest};

/// Publishes request records to the external request channel.
#[derive(Clone)]
pub struct RequestDispatcher {
    channel: Arc<dyn RequestChannel>,
}

impl RequestDispatcher {
    pub fn new(channel: Arc<dyn RequestChannel>) -> Self {
        Self { channel }
    }

    /// Encodes and publishes `request`, keyed by its user.
    pub async fn dispatch(&self, request: &TokenRequest) -> Result<()> {
        let payload = codec::encode_request(request).map_err(|e| Error::DispatchFailed {
            context: e.to_string(),
        })?;

        self.channel
            .publish(&request.user, payload)
            .await
            .map_err(|e| Error::DispatchFailed {
                context: e.to_string(),
            })?;

        tracing::debug!(
            correlation_id = %request.correlation_id,
            user = %request.user,
            "dispatched token request"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::request_channel;

    #[tokio::test]
    async fn dispatch_publishes_keyed_by_user() {
        let (channel, mut rx) = request_channel(4);
        let dispatcher = RequestDispatcher::new(Arc::new(channel));
        let request = TokenRequest::new("alice", "s3cret");

        dispatcher.dispatch(&request).await.unwrap();

        let record = rx.recv().await.unwrap();
        assert_eq!(record.key, "alice");
        assert_eq!(codec::decode_request(&record.payload).unwrap(), request);
    }

    #[tokio::test]
    async fn publish_failure_surfaces_as_dispatch_failed() {
        let (channel, rx) = request_channel(4);
        drop(rx);
        let dispatcher = RequestDispatcher::new(Arc::new(channel));

        let err = dispatcher
            .dispatch(&TokenRequest::new("alice", "s3cret"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DispatchFailed { .. }));
    }
}
