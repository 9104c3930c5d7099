use crate::chat::ChatService;
use crate::handlers;
use crate::middleware::request_logging;
use crate::sessions::SessionService;
use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use parley_agent::AgentRuntime;
use parley_session::SessionStore;
use std::sync::Arc;
use tower::ServiceBuilder;

/// How streamed responses are framed.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Data of an extra frame sent after the last fragment, e.g. `[DONE]`.
    pub done_sentinel: Option<String>,
    /// Seconds between keep-alive comments on an idle stream.
    pub keep_alive_secs: u64,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            done_sentinel: None,
            keep_alive_secs: 15,
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Session lifecycle operations.
    pub sessions: SessionService,
    /// Chat turns.
    pub chat: ChatService,
    /// Framing of streamed responses.
    pub stream: StreamOptions,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway with default stream framing.
    pub fn build(sessions: Arc<dyn SessionStore>, runtime: Arc<dyn AgentRuntime>) -> Router {
        Self::build_with_options(sessions, runtime, StreamOptions::default())
    }

    /// Build the gateway with explicit stream framing.
    pub fn build_with_options(
        sessions: Arc<dyn SessionStore>,
        runtime: Arc<dyn AgentRuntime>,
        stream: StreamOptions,
    ) -> Router {
        let state = Arc::new(AppState {
            sessions: SessionService::new(sessions.clone(), runtime.clone()),
            chat: ChatService::new(sessions, runtime),
            stream,
        });

        Router::new()
            .route("/ping", get(handlers::ping))
            .route("/v1/invocations", post(handlers::invoke))
            .route(
                "/v1/sessions",
                post(handlers::create_session).delete(handlers::delete_session),
            )
            .route(
                "/v1/sessions/{session_id}",
                get(handlers::get_session).delete(handlers::delete_session_by_path),
            )
            .with_state(state)
            .layer(ServiceBuilder::new().layer(axum_mw::from_fn(request_logging)))
    }
}
