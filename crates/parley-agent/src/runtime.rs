use crate::backends::{LlmBackend, OpenAiBackend};
use crate::cache::{SessionAgent, SessionAgentCache};
use crate::config::ModelConfig;
use crate::context::ContextWindow;
use crate::fragment::FragmentStream;
use crate::stream::StreamEvent;
use crate::tools::ToolServersConfig;
use async_trait::async_trait;
use parley_core::{Message, ParleyError, ParleyResult};
use parley_session::SessionStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Port to whatever executes model inference for a session.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Produce one complete response to `prompt` within `session_id`.
    async fn respond(&self, session_id: &str, prompt: &str) -> ParleyResult<String>;

    /// Produce the response to `prompt` as a stream of fragments.
    async fn respond_stream(&self, session_id: &str, prompt: &str)
        -> ParleyResult<FragmentStream>;

    /// Drop any agent bound to `session_id`.
    async fn release(&self, _session_id: &str) {}

    /// Drop every binding and stop background work.
    async fn shutdown(&self) {}
}

/// Agent runtime that keeps one conversation window per session and talks to
/// an [`LlmBackend`].
///
/// Completed turns are appended to the session record in the store, and a
/// binding created after a restart is seeded from those stored messages.
pub struct LlmAgentRuntime {
    backend: Arc<dyn LlmBackend>,
    sessions: Arc<dyn SessionStore>,
    agents: SessionAgentCache,
    system_prompt: String,
    context_window: usize,
    tool_servers: ToolServersConfig,
}

impl LlmAgentRuntime {
    /// Build a runtime backed by the OpenAI-compatible backend for `config`.
    pub fn new(config: ModelConfig, sessions: Arc<dyn SessionStore>) -> Self {
        let system_prompt = config.system_prompt().to_string();
        let context_window = config.context_window;
        Self::with_backend(
            Arc::new(OpenAiBackend::new(config)),
            sessions,
            system_prompt,
            context_window,
        )
    }

    /// Build a runtime over an explicit backend.
    pub fn with_backend(
        backend: Arc<dyn LlmBackend>,
        sessions: Arc<dyn SessionStore>,
        system_prompt: impl Into<String>,
        context_window: usize,
    ) -> Self {
        Self {
            backend,
            sessions,
            agents: SessionAgentCache::new(),
            system_prompt: system_prompt.into(),
            context_window,
            tool_servers: ToolServersConfig::default(),
        }
    }

    /// Attach the plugin tool server configuration and report it.
    pub fn with_tool_servers(mut self, tool_servers: ToolServersConfig) -> Self {
        for (name, server) in tool_servers.enabled() {
            info!(
                server_name = %name,
                transport = server.transport.kind(),
                "Tool server configured"
            );
        }
        for name in tool_servers.disabled() {
            info!(server_name = %name, "Tool server disabled, skipping");
        }
        self.tool_servers = tool_servers;
        self
    }

    /// Tool server configuration attached with [`Self::with_tool_servers`].
    pub fn tool_servers(&self) -> &ToolServersConfig {
        &self.tool_servers
    }

    /// Agents currently bound to sessions.
    pub fn agents(&self) -> &SessionAgentCache {
        &self.agents
    }

    /// Get the agent bound to the current record of `session_id`, creating it
    /// from the stored session when there is none or the cached one belongs
    /// to a record that has since been replaced.
    async fn binding(&self, session_id: &str) -> ParleyResult<Arc<SessionAgent>> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| ParleyError::SessionNotFound(session_id.to_string()))?;

        if let Some(agent) = self.agents.get(session_id) {
            if agent.created_at() == session.created_at {
                info!(session_id = %session_id, "Reusing existing agent for session");
                return Ok(agent);
            }
            info!(session_id = %session_id, "Discarding agent of a replaced session");
        }

        let mut window = ContextWindow::new(self.context_window);
        window.set_system_prompt(self.system_prompt.clone());
        for message in session.messages {
            window.push(message);
        }

        let agent = self.agents.get_or_insert(SessionAgent::new(
            session_id,
            session.created_at,
            window,
        ));
        info!(session_id = %session_id, "Agent created for session");
        Ok(agent)
    }
}

/// Append a finished turn to the session record the agent is bound to.
///
/// Nothing is written if that record was deleted or replaced while the turn
/// ran. Failures are logged, not returned: the caller already has its answer.
async fn persist_turn(
    sessions: &dyn SessionStore,
    agent: &SessionAgent,
    user: Message,
    assistant: Message,
) {
    if let Err(e) = sessions
        .append_messages(agent.session_id(), agent.created_at(), &[user, assistant])
        .await
    {
        warn!(session_id = %agent.session_id(), error = %e, "Chat turn not persisted");
    }
}

#[async_trait]
impl AgentRuntime for LlmAgentRuntime {
    async fn respond(&self, session_id: &str, prompt: &str) -> ParleyResult<String> {
        let agent = self.binding(session_id).await?;
        let mut window = agent.window.lock().await;

        let user = Message::user(prompt);
        let messages = window.with_pending(user.clone());
        let text = self.backend.chat(window.system_prompt(), &messages).await?;

        let assistant = Message::assistant(text.clone());
        window.push(user.clone());
        window.push(assistant.clone());
        persist_turn(self.sessions.as_ref(), &agent, user, assistant).await;

        info!(session_id = %session_id, chars = text.len(), "Agent responded");
        Ok(text)
    }

    async fn respond_stream(
        &self,
        session_id: &str,
        prompt: &str,
    ) -> ParleyResult<FragmentStream> {
        let agent = self.binding(session_id).await?;
        let backend = self.backend.clone();
        let sessions = self.sessions.clone();
        let session_id = session_id.to_string();
        let user = Message::user(prompt);

        Ok(FragmentStream::spawn(move |sender| async move {
            let mut window = agent.window.lock().await;
            let messages = window.with_pending(user.clone());

            let (mut events, completion) =
                match backend.chat_stream(window.system_prompt(), &messages).await {
                    Ok(parts) => parts,
                    Err(e) => {
                        sender.fail(e).await;
                        return;
                    }
                };

            while let Some(event) = events.recv().await {
                match event {
                    StreamEvent::TextDelta { text } => {
                        if text.is_empty() {
                            continue;
                        }
                        if !sender.send(text).await {
                            completion.abort();
                            return;
                        }
                    }
                    StreamEvent::Error { message } => {
                        completion.abort();
                        sender.fail(ParleyError::Upstream(message)).await;
                        return;
                    }
                    StreamEvent::Done => {}
                }
            }

            let text = match completion.await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    sender.fail(e).await;
                    return;
                }
                Err(e) => {
                    sender
                        .fail(ParleyError::Upstream(format!("Completion task failed: {e}")))
                        .await;
                    return;
                }
            };

            let assistant = Message::assistant(text.clone());
            window.push(user.clone());
            window.push(assistant.clone());
            persist_turn(sessions.as_ref(), &agent, user, assistant).await;
            info!(session_id = %session_id, chars = text.len(), "Agent stream completed");
        }))
    }

    async fn release(&self, session_id: &str) {
        if self.agents.remove(session_id).is_some() {
            info!(session_id = %session_id, "Agent released");
        }
    }

    async fn shutdown(&self) {
        info!(agents = self.agents.len(), "Shutting down agent runtime");
        self.agents.clear();
    }
}
