//! Agent runtime for Parley: per-session agents over an LLM backend,
//! streamed as fragments.

/// Model provider backends.
pub mod backends;
/// Per-session agent cache.
pub mod cache;
/// Model configuration.
pub mod config;
/// Bounded conversation window.
pub mod context;
/// Fragment streams handed to the HTTP layer.
pub mod fragment;
/// The agent runtime port and its LLM-backed adapter.
pub mod runtime;
/// Backend stream events.
pub mod stream;
pub mod tools;

pub use backends::LlmBackend;
pub use cache::{SessionAgent, SessionAgentCache};
pub use config::{LlmProvider, ModelConfig};
pub use context::ContextWindow;
pub use fragment::{FragmentSender, FragmentStream};
pub use runtime::{AgentRuntime, LlmAgentRuntime};
pub use stream::StreamEvent;
pub use tools::{ToolServerConfig, ToolServersConfig, ToolTransport};
