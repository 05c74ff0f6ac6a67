//! # Drawbridge Server
//!
//! The Canvas State Service: a single localhost listener hosting the REST
//! facade (legacy + `/api` surfaces), the WebSocket facade for editor peers,
//! and the `/mcp` JSON-RPC endpoint for AI agents. This library is used by
//! both the binary and the integration tests.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use drawbridge_core::{BroadcastBus, Correlator, PeerId, SceneStore, ServerFrame};
use drawbridge_mcp::ToolGateway;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;
pub mod ws;

/// JSON request bodies are accepted up to 50 MB (scenes with embedded
/// image files get large).
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative scene store.
    pub store: SceneStore,
    /// WebSocket peer registry and fan-out.
    pub bus: BroadcastBus,
    /// Pending-request correlator for editor round-trips.
    pub correlator: Correlator,
    /// JSON-RPC tool gateway.
    pub gateway: Arc<ToolGateway>,
}

impl AppState {
    /// Create fresh state with an empty scene.
    #[must_use]
    pub fn new() -> Self {
        let store = SceneStore::new();
        let bus = BroadcastBus::new();
        let correlator = Correlator::new();
        let gateway = Arc::new(ToolGateway::new(
            store.clone(),
            bus.clone(),
            correlator.clone(),
        ));
        Self {
            store,
            bus,
            correlator,
            gateway,
        }
    }

    /// Broadcast the full canonical scene to every peer.
    pub fn broadcast_sync(&self) {
        self.bus.broadcast(
            &ServerFrame::CanvasSync {
                data: self.store.scene_data(),
            },
            None,
        );
    }

    /// Broadcast a mutation event followed by the full scene.
    pub fn broadcast_mutation(&self, frame: ServerFrame) {
        self.bus.broadcast(&frame, None);
        self.broadcast_sync();
    }

    /// Like [`AppState::broadcast_mutation`], excluding the peer the
    /// mutation came from (echo suppression).
    pub fn broadcast_mutation_from(&self, frame: ServerFrame, sender: PeerId) {
        self.bus.broadcast(&frame, Some(sender));
        self.bus.broadcast(
            &ServerFrame::CanvasSync {
                data: self.store.scene_data(),
            },
            Some(sender),
        );
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the full router over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Legacy surface, kept verbatim for older clients.
        .route("/health", get(routes::health))
        .route(
            "/canvas",
            get(routes::legacy_get_canvas).post(routes::legacy_post_canvas),
        )
        .route(
            "/elements",
            get(routes::legacy_list_elements).post(routes::legacy_create_element),
        )
        .route(
            "/elements/{id}",
            get(routes::legacy_get_element)
                .put(routes::legacy_put_element)
                .delete(routes::legacy_delete_element),
        )
        .route("/clear", post(routes::legacy_clear))
        .route("/snapshot", get(routes::legacy_snapshot))
        // Primary surface.
        .route(
            "/api/elements",
            get(routes::api_list).post(routes::api_create),
        )
        .route("/api/elements/search", get(routes::api_search))
        .route("/api/elements/batch", post(routes::api_batch))
        .route("/api/elements/sync", post(routes::api_sync_elements))
        .route("/api/elements/clear", delete(routes::api_clear))
        .route("/api/elements/from-mermaid", post(routes::api_from_mermaid))
        .route(
            "/api/elements/from-mermaid/result",
            post(routes::api_from_mermaid_result),
        )
        .route(
            "/api/elements/{id}",
            get(routes::api_get)
                .put(routes::api_put)
                .delete(routes::api_delete),
        )
        .route("/api/export/image", post(routes::api_export_image))
        .route(
            "/api/export/image/result",
            post(routes::api_export_image_result),
        )
        .route("/api/viewport", post(routes::api_viewport))
        .route("/api/viewport/result", post(routes::api_viewport_result))
        .route(
            "/api/snapshots",
            get(routes::api_snapshot_list).post(routes::api_snapshot_create),
        )
        .route("/api/snapshots/{name}", get(routes::api_snapshot_get))
        .route("/api/sync/status", get(routes::api_sync_status))
        // Tool gateway and WebSocket share the listener.
        .route("/mcp", post(routes::mcp))
        .route("/ws", get(ws::websocket_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
