// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "cas/mod.rs"]
pub mod cas;

#[path = "spamlist/mod.rs"]
pub mod spamlist;
