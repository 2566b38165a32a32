//! User-facing operations.
//!
//! Each command validates its input, performs the remote write and only
//! then merges the confirmed result into the cache. A failed write never
//! touches the cache.

pub mod chat;
pub mod discussions;
pub mod projects;
pub mod tasks;
