//! WebSocket transport for agent clients.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinSet};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    error::TransportError,
    protocol::{ClientMessage, ServerMessage},
    service::{OpService, respond},
};

/// WebSocket handler state.
pub struct WsState<S: ?Sized> {
    pub service: Arc<S>,
}

impl<S: ?Sized> Clone for WsState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S> WsState<S> {
    #[must_use]
    pub const fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler<S>(
    ws: WebSocketUpgrade,
    State(state): State<WsState<S>>,
) -> impl IntoResponse
where
    S: OpService,
{
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

fn decode(text: &str) -> Result<ClientMessage, TransportError> {
    Ok(serde_json::from_str(text)?)
}

fn encode(msg: &ServerMessage) -> Result<Message, TransportError> {
    Ok(Message::Text(serde_json::to_string(msg)?.into()))
}

async fn handle_socket<S>(socket: WebSocket, state: WsState<S>)
where
    S: OpService,
{
    let connection = Uuid::new_v4();
    let lifecycle = state.service.lifecycle();
    lifecycle.on_connect();
    lifecycle.on_join(&state.service.identity());
    tracing::debug!(%connection, "Client connected");

    let (mut sender, mut receiver) = socket.split();

    // Channel for sending messages to the client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let frame = match encode(&msg) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    // Each request answers on its own task so a pending wait blocks nothing.
    let mut requests = JoinSet::new();
    let mut feed_task: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(%connection, "WebSocket error: {e}");
                break;
            }
        };

        let client_msg = match decode(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(%connection, "Invalid client message: {e}");
                let _ = tx.send(ServerMessage::error(None, e.to_string()));
                continue;
            }
        };

        while requests.try_join_next().is_some() {}

        match client_msg {
            ClientMessage::Ping => {
                let _ = tx.send(ServerMessage::Pong);
            }
            ClientMessage::Subscribe { op_name } => {
                if let Some(previous) = feed_task.take() {
                    previous.abort();
                }
                let mut stream = state.service.feed(op_name.as_deref());
                let tx = tx.clone();
                feed_task = Some(tokio::spawn(async move {
                    while let Some(event) = stream.next().await {
                        if tx.send(ServerMessage::Feed { event }).is_err() {
                            break;
                        }
                    }
                }));
            }
            request => {
                let service = Arc::clone(&state.service);
                let tx = tx.clone();
                requests.spawn(async move {
                    if let Some(reply) = respond(&*service, request).await {
                        if tx.send(reply).is_err() {
                            tracing::debug!(%connection, error = %TransportError::ChannelClosed, "Reply dropped");
                        }
                    }
                });
            }
        }
    }

    if let Some(feed_task) = feed_task {
        feed_task.abort();
    }
    requests.abort_all();
    send_task.abort();

    lifecycle.on_leave("connection closed");
    lifecycle.on_disconnect();
    tracing::debug!(%connection, "Client disconnected");
}

/// Create WebSocket router.
///
/// # Example
/// ```ignore
/// let app = Router::new()
///     .merge(create_ws_router(Arc::new(agent_handle)));
/// ```
#[must_use]
pub fn create_ws_router<S>(service: Arc<S>) -> axum::Router
where
    S: OpService,
{
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(WsState::new(service))
}
