// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "spamlist/mod.rs"]
pub mod spamlist;

#[path = "moderation/mod.rs"]
pub mod moderation;
