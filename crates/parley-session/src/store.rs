use crate::locks::KeyedLocks;
use crate::session::Session;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::{Message, ParleyError, ParleyResult};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Persistence port for session records.
///
/// Implementations own their storage and their own serialization; callers
/// never lock around store calls.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails if the id is already taken.
    async fn create(&self, session: &Session) -> ParleyResult<()>;
    /// Fetch a record, `None` if absent.
    async fn get(&self, id: &str) -> ParleyResult<Option<Session>>;
    /// Overwrite an existing record (or write it if absent).
    async fn update(&self, session: &Session) -> ParleyResult<()>;
    /// Remove a record. Returns `true` if one was removed.
    async fn delete(&self, id: &str) -> ParleyResult<bool>;
    /// Ids of every stored session, sorted.
    async fn list(&self) -> ParleyResult<Vec<String>>;
    /// Fetch `id`, creating an empty session under that id if absent.
    ///
    /// Atomic per id: concurrent callers observe exactly one creation.
    /// The flag is `true` for the caller that created the record.
    async fn get_or_create(&self, id: &str) -> ParleyResult<(Session, bool)>;
    /// Append `messages` to the record for `id` created at `created_at`.
    ///
    /// Atomic per id. Fails with [`ParleyError::SessionNotFound`] if the
    /// record is gone and with [`ParleyError::Session`] if `id` now names a
    /// record created at another time; neither case writes anything.
    async fn append_messages(
        &self,
        id: &str,
        created_at: DateTime<Utc>,
        messages: &[Message],
    ) -> ParleyResult<()>;
}

/// Session ids double as file stems, so restrict them to a safe alphabet.
pub fn validate_session_id(id: &str) -> ParleyResult<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ParleyError::Validation(format!("Invalid session id: {id:?}")))
    }
}

/// File-based session store: one pretty-printed JSON file per session.
pub struct FileSessionStore {
    dir: PathBuf,
    locks: KeyedLocks,
}

impl FileSessionStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn new(dir: PathBuf) -> ParleyResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "File session store ready");
        Ok(Self {
            dir,
            locks: KeyedLocks::new(),
        })
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: &str) -> ParleyResult<Option<Session>> {
        let data = match tokio::fs::read_to_string(self.session_path(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&data)
            .map_err(|e| ParleyError::Session(format!("Failed to parse session {id}: {e}")))?;
        Ok(Some(session))
    }

    // Write to a sibling temp file and rename so readers never see a torn record.
    async fn write(&self, session: &Session) -> ParleyResult<()> {
        let path = self.session_path(&session.id);
        let tmp = self.dir.join(format!("{}.json.tmp", session.id));
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, session: &Session) -> ParleyResult<()> {
        validate_session_id(&session.id)?;
        let _guard = self.locks.lock(&session.id).await;
        if self.read(&session.id).await?.is_some() {
            return Err(ParleyError::Session(format!(
                "Session {} already exists",
                session.id
            )));
        }
        self.write(session).await?;
        debug!(session_id = %session.id, "Session file created");
        Ok(())
    }

    async fn get(&self, id: &str) -> ParleyResult<Option<Session>> {
        validate_session_id(id)?;
        self.read(id).await
    }

    async fn update(&self, session: &Session) -> ParleyResult<()> {
        validate_session_id(&session.id)?;
        let _guard = self.locks.lock(&session.id).await;
        self.write(session).await
    }

    async fn delete(&self, id: &str) -> ParleyResult<bool> {
        validate_session_id(id)?;
        let _guard = self.locks.lock(id).await;
        match tokio::fs::remove_file(self.session_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> ParleyResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    if validate_session_id(stem).is_ok() {
                        ids.push(stem.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn get_or_create(&self, id: &str) -> ParleyResult<(Session, bool)> {
        validate_session_id(id)?;
        let _guard = self.locks.lock(id).await;
        if let Some(existing) = self.read(id).await? {
            return Ok((existing, false));
        }
        let session = Session::with_id(id);
        self.write(&session).await?;
        debug!(session_id = %id, "Session file created on first use");
        Ok((session, true))
    }

    async fn append_messages(
        &self,
        id: &str,
        created_at: DateTime<Utc>,
        messages: &[Message],
    ) -> ParleyResult<()> {
        validate_session_id(id)?;
        let _guard = self.locks.lock(id).await;
        let mut session = self
            .read(id)
            .await?
            .ok_or_else(|| ParleyError::SessionNotFound(id.to_string()))?;
        session.append_checked(created_at, messages)?;
        self.write(&session).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_id_accepts_uuid_and_slugs() {
        assert!(validate_session_id("0b7f0c1e-1b2c-4d5e-8f90-a1b2c3d4e5f6").is_ok());
        assert!(validate_session_id("new-id").is_ok());
        assert!(validate_session_id("user_42.chat").is_ok());
    }

    #[test]
    fn test_validate_session_id_rejects_paths() {
        let long = "x".repeat(129);
        for bad in ["", "../etc/passwd", ".hidden", "a/b", "a b", long.as_str()] {
            let err = validate_session_id(bad).unwrap_err();
            assert!(matches!(err, ParleyError::Validation(_)), "accepted {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_lock_map_does_not_grow_with_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        for i in 0..50 {
            let id = format!("s{i}");
            let (session, _) = store.get_or_create(&id).await.unwrap();
            store.update(&session).await.unwrap();
            store
                .append_messages(&id, session.created_at, &[Message::user("hi")])
                .await
                .unwrap();
        }
        store.create(&Session::with_id("explicit")).await.unwrap();
        assert!(store.locks.is_empty());
    }

    #[tokio::test]
    async fn test_read_corrupt_file_is_session_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        tokio::fs::write(tmp.path().join("broken.json"), "{oops")
            .await
            .unwrap();
        let err = store.get("broken").await.unwrap_err();
        assert!(matches!(err, ParleyError::Session(_)));
    }
}
