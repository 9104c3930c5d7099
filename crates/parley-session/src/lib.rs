//! Session records and the pluggable stores that persist them.

/// Per-id async locks.
pub mod locks;
/// In-process session store.
pub mod memory;
/// The session record.
pub mod session;
/// The session store port and its file-backed adapter.
pub mod store;

pub use locks::{KeyedGuard, KeyedLocks};
pub use memory::MemorySessionStore;
pub use session::Session;
pub use store::{FileSessionStore, SessionStore};
