use crate::context::ContextWindow;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The agent bound to one session record: its conversation window.
///
/// Turns on the same session serialize on `window`. `created_at` pins the
/// agent to the record it was seeded from, so a session deleted and
/// recreated under the same id never shares an agent with its predecessor.
pub struct SessionAgent {
    session_id: String,
    created_at: DateTime<Utc>,
    pub(crate) window: Mutex<ContextWindow>,
}

impl SessionAgent {
    /// Bind a window to the session record `session_id` created at `created_at`.
    pub fn new(
        session_id: impl Into<String>,
        created_at: DateTime<Utc>,
        window: ContextWindow,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            created_at,
            window: Mutex::new(window),
        }
    }

    /// Id of the bound session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Creation time of the bound session record.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of messages currently in the window.
    pub async fn window_len(&self) -> usize {
        self.window.lock().await.len()
    }
}

/// Concurrency-safe map from session id to its [`SessionAgent`].
#[derive(Default)]
pub struct SessionAgentCache {
    agents: RwLock<HashMap<String, Arc<SessionAgent>>>,
}

impl SessionAgentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Agent bound to `session_id`, if any.
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionAgent>> {
        self.agents.read().get(session_id).cloned()
    }

    /// Insert `agent` unless one bound to the same session record is already
    /// cached; either way return the bound one. An agent left over from an
    /// earlier record under the same id is replaced.
    pub fn get_or_insert(&self, agent: SessionAgent) -> Arc<SessionAgent> {
        let mut agents = self.agents.write();
        if let Some(existing) = agents.get(&agent.session_id) {
            if existing.created_at == agent.created_at {
                return existing.clone();
            }
        }
        let agent = Arc::new(agent);
        agents.insert(agent.session_id.clone(), agent.clone());
        agent
    }

    /// Unbind `session_id`, returning the agent that was bound.
    pub fn remove(&self, session_id: &str) -> Option<Arc<SessionAgent>> {
        self.agents.write().remove(session_id)
    }

    /// Unbind every session.
    pub fn clear(&self) {
        self.agents.write().clear();
    }

    /// Number of bound sessions.
    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    /// True when no session is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
