// Core moderation module - reacts to joins and commands.
// Following the same pattern as the spamlist module.

pub mod moderation_models;
pub mod moderation_service;

pub use moderation_models::*;
pub use moderation_service::*;
