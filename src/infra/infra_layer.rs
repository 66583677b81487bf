// The infra module contains implementations of core traits.
// Each backend goes in its own submodule.

#[path = "storage/mod.rs"]
pub mod storage;

#[path = "reddit/mod.rs"]
pub mod reddit;

#[path = "webhooks/mod.rs"]
pub mod webhooks;
