//! Axum controllers. Request bodies are validated by the `Json` extractor;
//! domain errors go through [`ApiError`].

use crate::chat::ChatReply;
use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::{stream, Stream, StreamExt};
use parley_agent::FragmentStream;
use parley_session::Session;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Body of `POST /v1/invocations`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Session the turn belongs to; created if unknown.
    pub session_id: String,
    /// Answer as server-sent events instead of one JSON body.
    #[serde(default)]
    pub stream: bool,
}

/// Non-streamed answer to a chat turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's full reply.
    pub data: String,
}

/// Body of `POST /v1/sessions`.
#[derive(Debug, Deserialize)]
pub struct SessionCreateRequest {
    /// Owner of the new session.
    pub user_id: String,
}

/// Body of `DELETE /v1/sessions`.
#[derive(Debug, Deserialize)]
pub struct SessionDeleteRequest {
    /// Session to delete.
    pub session_id: String,
}

/// Id of a newly created session.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    /// The generated session id.
    pub session_id: String,
}

/// A stored session as returned by `GET /v1/sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct SessionDataResponse {
    /// Id the session was requested by.
    pub session_id: String,
    /// The full session record.
    pub data: Session,
}

/// `GET /ping`: liveness check.
pub async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /v1/invocations`: one chat turn, as JSON or as server-sent events.
pub async fn invoke(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let reply = state
        .chat
        .respond(&req.session_id, &req.message, req.stream)
        .await?;

    match reply {
        ChatReply::Complete(data) => Ok(Json(ChatResponse { data }).into_response()),
        ChatReply::Stream(fragments) => {
            let keep_alive =
                KeepAlive::new().interval(Duration::from_secs(state.stream.keep_alive_secs));
            let events = sse_events(fragments, state.stream.done_sentinel.clone());
            Ok(Sse::new(events).keep_alive(keep_alive).into_response())
        }
    }
}

/// One `data:` frame per fragment. An error becomes a final `event: error`
/// frame; a clean end emits the sentinel frame when one is configured.
fn sse_events(
    fragments: FragmentStream,
    done_sentinel: Option<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some((fragments, done_sentinel)), |state| async move {
        let (mut fragments, done_sentinel) = state?;
        match fragments.next().await {
            Some(Ok(text)) => Some((Ok(frame(&text)), Some((fragments, done_sentinel)))),
            Some(Err(e)) => {
                warn!(error = %e, "Stream ended with error");
                Some((Ok(frame(&e.to_string()).event("error")), None))
            }
            None => done_sentinel.map(|sentinel| (Ok(frame(&sentinel)), None)),
        }
    })
}

// SSE cannot carry carriage returns.
fn frame(data: &str) -> Event {
    Event::default().data(data.replace('\r', ""))
}

/// `POST /v1/sessions`
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionCreateRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = state.sessions.create_session(&req.user_id).await?;
    Ok(Json(SessionResponse { session_id }))
}

/// `GET /v1/sessions/{session_id}`
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDataResponse>, ApiError> {
    let session = state.sessions.get_session(&session_id).await?;
    Ok(Json(SessionDataResponse {
        session_id,
        data: session,
    }))
}

/// `DELETE /v1/sessions` with the id in the body.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionDeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    remove_session(&state, &req.session_id).await
}

/// `DELETE /v1/sessions/{session_id}`
pub async fn delete_session_by_path(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    remove_session(&state, &session_id).await
}

async fn remove_session(
    state: &AppState,
    session_id: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.sessions.delete_session(session_id).await?;
    Ok(Json(serde_json::json!({ "message": "Session deleted" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parley_core::ParleyError;

    #[test]
    fn test_chat_request_stream_defaults_false() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message": "hi", "session_id": "s1"}"#).unwrap();
        assert!(!req.stream);
    }

    #[test]
    fn test_chat_request_requires_session_id() {
        assert!(serde_json::from_str::<ChatRequest>(r#"{"message": "hi"}"#).is_err());
    }

    #[tokio::test]
    async fn test_sse_events_end_with_sentinel() {
        let fragments = FragmentStream::from_fragments(["a", "b"]);
        let events: Vec<_> = sse_events(fragments, Some("[DONE]".into())).collect().await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_sse_events_stop_after_error() {
        let fragments = FragmentStream::spawn(|sender| async move {
            sender.send("partial").await;
            sender.fail(ParleyError::Upstream("boom".into())).await;
            sender.send("never").await;
        });
        let events: Vec<_> = sse_events(fragments, Some("[DONE]".into())).collect().await;
        assert_eq!(events.len(), 2);
    }
}
