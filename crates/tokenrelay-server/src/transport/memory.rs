//! In-memory transport closing the request/response loop in-process.
//!
//! The request channel is a single bounded mpsc queue. One queue preserves
//! global submission order, which trivially satisfies the per-key ordering
//! contract; the key still travels with each record for log parity with a
//! partitioned broker.
//!
//! The response channel is a broadcast fan-out: every `subscribe()` call
//! gets an independent view of the full stream, mirroring the
//! anonymous-consumer-group semantics a broker-backed implementation would
//! provide.

use crate::transport::{RequestChannel, ResponseChannel};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokenrelay_core::{Error, Result};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;

/// One keyed record on the in-memory request channel.
#[derive(Debug)]
pub struct RequestRecord {
    /// Partition/ordering key; the user identifier.
    pub key: String,
    /// Encoded `TokenRequest`.
    pub payload: Vec<u8>,
}

/// Sender half of the in-memory request channel.
pub struct MemoryRequestChannel {
    tx: mpsc::Sender<RequestRecord>,
}

/// Creates the in-memory request channel.
///
/// The receiver side is handed to the issuance stage (or a test harness)
/// as the downstream consumer.
pub fn request_channel(capacity: usize) -> (MemoryRequestChannel, mpsc::Receiver<RequestRecord>) {
    let (tx, rx) = mpsc::channel(capacity);
    (MemoryRequestChannel { tx }, rx)
}

#[async_trait]
impl RequestChannel for MemoryRequestChannel {
    async fn publish(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.tx
            .send(RequestRecord {
                key: key.to_owned(),
                payload,
            })
            .await
            .map_err(|_| Error::ChannelClosed {
                context: "request channel consumer dropped".into(),
            })
    }
}

/// Broadcast-backed response channel.
pub struct MemoryResponseChannel {
    tx: broadcast::Sender<Vec<u8>>,
}

impl MemoryResponseChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

#[async_trait]
impl ResponseChannel for MemoryResponseChannel {
    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>> {
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx).filter_map(|item| async {
            match item {
                Ok(payload) => Some(payload),
                Err(e) => {
                    // A lagged in-memory subscriber loses records, which a
                    // real broker consumer would re-read; log and continue.
                    tracing::warn!(error = %e, "response subscriber lagged, records skipped");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<()> {
        // A send with no live subscribers is not an error: the record is
        // simply unobserved, as on a topic nobody polls.
        let _ = self.tx.send(payload);
        Ok(())
    }
}
