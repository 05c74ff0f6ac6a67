//! WebSocket facade for editor peers.
//!
//! On connect the peer is attached to the bus and receives three frames in
//! order: `initial_elements`, `sync_status`, `canvas_sync`. Inbound scene
//! mutations are applied to the store and re-broadcast to every peer except
//! the sender, which breaks the echo loop. Unknown frame tags are ignored.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use drawbridge_core::element::now_ms;
use drawbridge_core::{
    normalize_value, resolve_batch, ClientFrame, Element, PeerId, SceneData, ServerFrame,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;

use crate::AppState;

/// `GET /ws` upgrade handler.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one WebSocket connection to completion.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (peer, mut frames) = state.bus.attach();

    state.bus.send_to(
        peer,
        &ServerFrame::InitialElements {
            elements: state.store.list(),
        },
    );
    state.bus.send_to(
        peer,
        &ServerFrame::SyncStatus {
            connected_clients: state.bus.count(),
            timestamp: now_ms(),
        },
    );
    state.bus.send_to(
        peer,
        &ServerFrame::CanvasSync {
            data: state.store.scene_data(),
        },
    );

    let (mut sender, mut receiver) = socket.split();

    // Drain the peer's frame queue into the socket.
    let forward = tokio::spawn(async move {
        while let Some(text) = frames.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => handle_client_frame(&state, peer, &text),
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(%peer, "websocket transport error: {e}");
                break;
            }
            _ => {}
        }
    }

    state.bus.detach(peer);
    forward.abort();
}

fn handle_client_frame(state: &AppState, peer: PeerId, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(%peer, "ignoring inbound frame: {e}");
            return;
        }
    };

    match frame {
        ClientFrame::CanvasSync { data } => {
            let elements = sanitize_elements(state, data.get("elements"));
            let app_state = data
                .get("appState")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let files = data
                .get("files")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            state.store.replace_scene(SceneData {
                elements,
                app_state,
                files,
            });
            state.bus.broadcast(
                &ServerFrame::CanvasSync {
                    data: state.store.scene_data(),
                },
                Some(peer),
            );
        }
        ClientFrame::ElementCreated { element } => match normalize_value(element) {
            Ok(normalized) => {
                let mut batch = vec![normalized];
                resolve_batch(&mut batch, &state.store.list());
                let element = batch.remove(0).element;
                if element.is_deleted {
                    return;
                }
                state.store.put(element.clone());
                state.broadcast_mutation_from(ServerFrame::ElementCreated { element }, peer);
            }
            Err(e) => tracing::warn!(%peer, "rejecting inbound element: {e}"),
        },
        ClientFrame::ElementUpdated { id, updates } => match state.store.patch(&id, &updates) {
            Ok(element) => {
                state.broadcast_mutation_from(ServerFrame::ElementUpdated { element }, peer);
            }
            Err(e) => tracing::warn!(%peer, "inbound update failed: {e}"),
        },
        ClientFrame::ElementDeleted { id } => {
            if state.store.delete(&id) {
                state.broadcast_mutation_from(ServerFrame::ElementDeleted { id }, peer);
            }
        }
    }
}

/// Normalize a raw element array, dropping invalid entries and tombstones.
fn sanitize_elements(state: &AppState, raw: Option<&Value>) -> Vec<Element> {
    let Some(list) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut batch = Vec::with_capacity(list.len());
    for payload in list {
        match normalize_value(payload.clone()) {
            Ok(normalized) => batch.push(normalized),
            Err(e) => tracing::warn!("dropping invalid element in canvas_sync: {e}"),
        }
    }
    resolve_batch(&mut batch, &state.store.list());
    batch
        .into_iter()
        .map(|n| n.element)
        .filter(|e| !e.is_deleted)
        .collect()
}
