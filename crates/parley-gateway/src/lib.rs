//! HTTP surface for Parley: session and chat orchestration behind axum
//! controllers.

/// Chat turn orchestration.
pub mod chat;
/// Mapping of domain errors onto HTTP responses.
pub mod error;
pub mod handlers;
/// Request logging layer.
pub mod middleware;
/// Router assembly and shared state.
pub mod server;
/// Session lifecycle orchestration.
pub mod sessions;

pub use chat::{ChatReply, ChatService};
pub use error::ApiError;
pub use server::{AppState, GatewayServer, StreamOptions};
pub use sessions::SessionService;
