//! Outbound chunk channel.
//!
//! The client end is a stream of NDJSON lines. Dropping it is the only
//! cancellation signal the engine observes.

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::types::ChatChunk;

/// Writer half of the outbound stream.
#[derive(Debug, Clone)]
pub struct ChunkSink {
    tx: UnboundedSender<String>,
}

impl ChunkSink {
    /// A sink and the client-side stream of encoded lines.
    pub fn channel() -> (Self, UnboundedReceiverStream<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }

    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Whether the client has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the client has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Encode and send a chunk. Returns `false` if the client is gone.
    pub fn send(&self, chunk: &ChatChunk) -> bool {
        self.tx.send(chunk.to_line()).is_ok()
    }
}
