// Core notifications module - payload formatting and failure-isolated fan-out.

pub mod dispatcher;
pub mod formatting;

pub use dispatcher::*;
pub use formatting::*;
