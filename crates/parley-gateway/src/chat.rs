use parley_agent::{AgentRuntime, FragmentStream};
use parley_core::ParleyResult;
use parley_session::SessionStore;
use std::sync::Arc;
use tracing::info;

/// What a chat turn produced.
#[derive(Debug)]
pub enum ChatReply {
    /// The whole reply at once.
    Complete(String),
    /// The reply as it is generated.
    Stream(FragmentStream),
}

/// Runs one chat turn: make sure the session exists, then hand the turn to
/// the agent runtime.
pub struct ChatService {
    store: Arc<dyn SessionStore>,
    runtime: Arc<dyn AgentRuntime>,
}

impl ChatService {
    /// Build the service over a session store and an agent runtime.
    pub fn new(store: Arc<dyn SessionStore>, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { store, runtime }
    }

    /// Respond to `message` in `session_id`, creating the session on first use.
    ///
    /// The runtime is invoked exactly once and its result is returned as is.
    pub async fn respond(
        &self,
        session_id: &str,
        message: &str,
        stream: bool,
    ) -> ParleyResult<ChatReply> {
        let (_, created) = self.store.get_or_create(session_id).await?;
        if created {
            info!(session_id = %session_id, "Session created on first message");
        }

        if stream {
            let fragments = self.runtime.respond_stream(session_id, message).await?;
            Ok(ChatReply::Stream(fragments))
        } else {
            let text = self.runtime.respond(session_id, message).await?;
            Ok(ChatReply::Complete(text))
        }
    }
}
