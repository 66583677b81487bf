// Core mentions module - detection pipeline for moderator mentions.
// Same layout as the moderators module: models, ports, service.

pub mod detector;
pub mod history;
pub mod mention_models;
pub mod mention_service;
pub mod settings;

pub use detector::*;
pub use history::*;
pub use mention_models::*;
pub use mention_service::*;
pub use settings::*;
