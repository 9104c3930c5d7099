use chrono::{DateTime, Utc};
use parley_core::{Message, ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A conversation handle persisted by a [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id, also the record's key in the store.
    pub id: String,
    /// Owner given at explicit creation; `None` for sessions created by a chat turn.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Conversation so far, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// When this record was created. Tells a recreated session apart from
    /// an earlier one under the same id.
    pub created_at: DateTime<Utc>,
    /// Last time a message was added.
    pub updated_at: DateTime<Utc>,
    /// Free-form attributes.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    /// A session with a freshly generated id and no owner.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// A session under a caller-chosen id (lazy creation on first chat turn).
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    /// A session with a fresh id owned by `user_id`.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.user_id = Some(user_id.into());
        session
    }

    /// Append one message and bump `updated_at`.
    pub fn add_message(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Append `messages` if this is still the record created at `created_at`.
    pub fn append_checked(
        &mut self,
        created_at: DateTime<Utc>,
        messages: &[Message],
    ) -> ParleyResult<()> {
        if self.created_at != created_at {
            return Err(ParleyError::Session(format!(
                "Session {} was recreated since the turn started",
                self.id
            )));
        }
        for message in messages {
            self.add_message(message.clone());
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
