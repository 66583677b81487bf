// Triggers layer - inbound events and commands.
//
// Same shape as a chat-bot adapter: decode the platform's payload, call one
// core service, report the result. No business logic lives here.

#[path = "commands.rs"]
pub mod commands;

#[path = "events.rs"]
pub mod events;

pub use commands::Data;
