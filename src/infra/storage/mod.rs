// Storage backends for the modlist cache and mention history.

pub mod in_memory;
pub mod sqlite_store;

pub use in_memory::InMemoryStore;
pub use sqlite_store::SqliteStore;
