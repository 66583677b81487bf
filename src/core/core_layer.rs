// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "keyed_lock.rs"]
pub mod keyed_lock;

#[path = "moderators/mod.rs"]
pub mod moderators;

#[path = "mentions/mod.rs"]
pub mod mentions;

#[path = "notifications/mod.rs"]
pub mod notifications;

#[path = "leaderboard/leaderboard_service.rs"]
pub mod leaderboard;
