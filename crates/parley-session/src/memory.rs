use crate::session::Session;
use crate::store::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::{Message, ParleyError, ParleyResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process session store. Contents are lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True when no session is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> ParleyResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(ParleyError::Session(format!(
                "Session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> ParleyResult<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update(&self, session: &Session) -> ParleyResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> ParleyResult<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn list(&self) -> ParleyResult<Vec<String>> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_or_create(&self, id: &str) -> ParleyResult<(Session, bool)> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(id) {
            return Ok((existing.clone(), false));
        }
        let session = Session::with_id(id);
        sessions.insert(id.to_string(), session.clone());
        Ok((session, true))
    }

    async fn append_messages(
        &self,
        id: &str,
        created_at: DateTime<Utc>,
        messages: &[Message],
    ) -> ParleyResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ParleyError::SessionNotFound(id.to_string()))?;
        session.append_checked(created_at, messages)
    }
}
