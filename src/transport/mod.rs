//! Network transports carrying the MCP protocol

pub mod sse;

pub use sse::{SseTransport, TransportError};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc};

/// Read half of a transport: inbound JSON-RPC messages from clients
pub struct MessageReader {
    rx: mpsc::Receiver<String>,
}

impl MessageReader {
    pub(crate) fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Next inbound message, or `None` when the transport has closed
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Write half of a transport: outbound JSON-RPC messages to clients
#[derive(Clone)]
pub struct MessageWriter {
    tx: broadcast::Sender<String>,
    closed: Arc<AtomicBool>,
}

impl MessageWriter {
    pub(crate) fn new(tx: broadcast::Sender<String>) -> Self {
        Self {
            tx,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver a message to every connected client.
    ///
    /// A message sent while no client is connected is dropped, matching SSE
    /// semantics where a client may disconnect between request and response.
    /// Writing after the transport has been released is a fault.
    pub fn send(&self, message: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let _ = self.tx.send(message);
        Ok(())
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Shared flag the owning transport flips when it releases the socket
    pub(crate) fn closed_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    #[cfg(test)]
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
