use parley_agent::AgentRuntime;
use parley_core::{ParleyError, ParleyResult};
use parley_session::{Session, SessionStore};
use std::sync::Arc;
use tracing::info;

/// Explicit session lifecycle: create, fetch, delete.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    runtime: Arc<dyn AgentRuntime>,
}

impl SessionService {
    /// Build the service over a session store and an agent runtime.
    pub fn new(store: Arc<dyn SessionStore>, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self { store, runtime }
    }

    /// Create a session owned by `user_id` under a freshly generated id.
    pub async fn create_session(&self, user_id: &str) -> ParleyResult<String> {
        if user_id.trim().is_empty() {
            return Err(ParleyError::Validation("user_id must not be empty".into()));
        }

        let session = Session::for_user(user_id);
        self.store.create(&session).await?;
        info!(session_id = %session.id, user_id = %user_id, "Session created");
        Ok(session.id)
    }

    /// Fetch a session, or `SessionNotFound`.
    pub async fn get_session(&self, session_id: &str) -> ParleyResult<Session> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| ParleyError::SessionNotFound(session_id.to_string()))
    }

    /// Delete a session and release its agent. Deleting an absent session
    /// succeeds.
    pub async fn delete_session(&self, session_id: &str) -> ParleyResult<()> {
        if self.store.delete(session_id).await? {
            info!(session_id = %session_id, "Session deleted");
        } else {
            info!(session_id = %session_id, "Session already absent");
        }
        self.runtime.release(session_id).await;
        Ok(())
    }
}
