//! SSE transport for the MCP server
//!
//! Clients open `GET /sse` for the event stream. The first event is an
//! `endpoint` event naming the POST URL; JSON-RPC requests are posted there
//! and responses come back as `message` events on the stream.

use super::{MessageReader, MessageWriter};
use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use futures_util::stream;
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Errors related to the SSE transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind SSE listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("SSE transport closed")]
    Closed,
}

#[derive(Clone)]
struct SseState {
    inbound: mpsc::Sender<String>,
    outbound: MessageWriter,
}

/// A bound SSE listener.
///
/// Holds the serving task for the lifetime of the value; dropping it aborts
/// the task and releases the socket, so the listener is released on every
/// exit path of the scope that owns it.
pub struct SseTransport {
    local_addr: SocketAddr,
    serve_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

impl SseTransport {
    /// Bind the listener and return it with the paired message streams.
    ///
    /// Port 0 binds an ephemeral port; `local_addr` reports the actual one.
    pub async fn bind(
        port: u16,
    ) -> Result<(Self, MessageReader, MessageWriter), TransportError> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| TransportError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { port, source })?;

        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let (outbound_tx, _) = broadcast::channel(256);
        let writer = MessageWriter::new(outbound_tx);

        let state = SseState {
            inbound: inbound_tx,
            outbound: writer.clone(),
        };

        let app = Router::new()
            .route("/sse", get(sse_handler))
            .route("/message", post(message_handler))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::GET, Method::POST]),
            )
            .with_state(state);

        let serve_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("SSE listener failed: {}", e);
            }
        });

        Ok((
            Self {
                local_addr,
                serve_task,
                closed: writer.closed_handle(),
            },
            MessageReader::new(inbound_rx),
            writer,
        ))
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.serve_task.abort();
        self.closed.store(true, Ordering::Release);
    }
}

async fn sse_handler(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4();
    log::info!("SSE client connected: session {}", session_id);

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/message?sessionId={}", session_id));

    let rx = state.outbound.subscribe();
    let messages = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    return Some((Ok(Event::default().event("message").data(msg)), rx));
                }
                // A slow client skips messages it lagged past
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let events = stream::iter([Ok(endpoint)]).chain(messages);
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn message_handler(State(state): State<SseState>, body: String) -> impl IntoResponse {
    if state.inbound.send(body).await.is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, "transport closed");
    }
    (StatusCode::ACCEPTED, "Accepted")
}
