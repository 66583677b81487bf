// Core moderator directory module - the cached list of protected usernames.

pub mod directory_cache;
pub mod directory_models;

pub use directory_cache::*;
pub use directory_models::*;
