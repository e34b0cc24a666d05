//! WebSocket streaming clients
//!
//! Each upgraded connection becomes a [`WsClient`] in the broadcast registry.
//! The registry only ever touches the client's bounded queue; the connection
//! task drains that queue into the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::Extension;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::record::Entry;
use crate::registry::{ClientError, ClientId, Envelope, StreamClient};
use crate::server::listener::ConnectionGuard;
use crate::server::state::AppState;

/// Registry handle for one WebSocket connection
#[derive(Debug)]
pub struct WsClient {
    id: ClientId,
    peer: Option<SocketAddr>,
    queue: mpsc::Sender<Arc<str>>,
    closed: CancellationToken,
}

impl WsClient {
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl StreamClient for WsClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn send(&self, payload: &Arc<str>) -> Result<(), ClientError> {
        if self.closed.is_cancelled() {
            return Err(ClientError::Closed);
        }
        self.queue.try_send(Arc::clone(payload)).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::QueueFull,
            TrySendError::Closed(_) => ClientError::Closed,
        })
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

/// Upgrade handler for the streaming path
///
/// Requests that are not valid upgrades are rejected by the extractor with a
/// 4xx status before this runs.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    connection: Option<Extension<Arc<ConnectionGuard>>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let connection = connection.map(|Extension(guard)| guard);
    ws.on_upgrade(move |socket| serve_client(socket, peer, connection, state))
}

/// Drive one upgraded socket; `_connection` keeps the listener's slot taken
async fn serve_client(
    socket: WebSocket,
    peer: Option<SocketAddr>,
    _connection: Option<Arc<ConnectionGuard>>,
    state: AppState,
) {
    let (queue, mut outbound) = mpsc::channel(state.config.client_queue_capacity.max(1));
    let client = Arc::new(WsClient {
        id: state.registry.next_client_id(),
        peer,
        queue,
        closed: state.shutdown.child_token(),
    });

    // Late joiners get the current identity snapshot ahead of live records
    if let Some(info) = state.collection.application_info() {
        match Envelope::new(info.into_record()).to_payload() {
            Ok(payload) => {
                let _ = client.send(&payload);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize catch-up envelope"),
        }
    }

    let id = client.id;
    state.registry.register(Arc::clone(&client) as Arc<dyn StreamClient>);
    tracing::debug!(client_id = id, peer = ?peer, "WebSocket client connected");

    let (mut sink, mut inbound) = socket.split();

    loop {
        tokio::select! {
            _ = client.closed.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            payload = outbound.recv() => {
                let Some(payload) = payload else { break };
                if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                    tracing::debug!(client_id = id, error = %e, "WebSocket write failed");
                    break;
                }
            }
            message = inbound.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                // Inbound traffic carries no meaning; pings are answered by the socket
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(client_id = id, error = %e, "WebSocket read failed");
                    break;
                }
            },
        }
    }

    client.closed.cancel();
    state.registry.unregister(id);
    tracing::debug!(client_id = id, "WebSocket client disconnected");
}
