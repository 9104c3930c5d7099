//! Core types and error definitions for Parley.
//!
//! This crate holds the pieces every other Parley crate agrees on: the error
//! taxonomy surfaced across the session store, the agent runtime and the HTTP
//! layer, and the conversation message type persisted inside sessions.
//!
//! # Main types
//!
//! - [`ParleyError`]: Unified error enum for all Parley subsystems.
//! - [`ParleyResult`]: Convenience alias for `Result<T, ParleyError>`.
//! - [`Role`]: Message role (user, assistant, system).
//! - [`Message`]: A single message within a conversation session.

/// Error taxonomy shared by every crate.
pub mod error;
/// Conversation message types.
pub mod message;

pub use error::{ParleyError, ParleyResult};
pub use message::{Message, Role};
