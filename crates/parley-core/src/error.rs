use thiserror::Error;

/// A convenience `Result` alias using [`ParleyError`].
pub type ParleyResult<T> = Result<T, ParleyError>;

/// Top-level error type for Parley.
///
/// Controllers map variants onto HTTP statuses: [`ParleyError::SessionNotFound`]
/// becomes a 404, [`ParleyError::Validation`] a 422, and everything else a 500.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// The session store has no record for the given id.
    #[error("Session {0} not found")]
    SessionNotFound(String),

    /// Caller-supplied input was rejected before reaching a collaborator.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The agent runtime or the model provider behind it failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Session persistence failed for a reason other than a missing record.
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration could not be parsed or is incomplete.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParleyError {
    /// Returns true for errors that mean "no such session".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_))
    }
}
