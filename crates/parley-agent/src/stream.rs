use serde::{Deserialize, Serialize};

/// Events emitted by a backend during a streaming completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of text content from the assistant.
    TextDelta { text: String },

    /// The provider reported the end of the completion.
    Done,

    /// An error occurred during streaming.
    Error { message: String },
}
