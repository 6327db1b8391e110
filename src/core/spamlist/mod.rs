// Core spam list module - the registry of known spam accounts.
// Same layout as the moderation module: models + service.

pub mod spamlist_models;
pub mod spamlist_service;

pub use spamlist_models::*;
pub use spamlist_service::*;
