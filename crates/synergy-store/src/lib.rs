//! # synergy-store
//!
//! Embedded document database for SynergySphere, backed by SQLite.
//!
//! Documents are schemaless JSON objects grouped into named collections.
//! The crate exposes a synchronous [`Database`] handle wrapping a
//! `rusqlite::Connection` with typed helpers for documents, accounts and
//! scheduled notifications, plus a broadcast [`ChangeFeed`] that live
//! queries listen on.

pub mod accounts;
pub mod database;
pub mod documents;
pub mod feed;
pub mod migrations;
pub mod models;
pub mod query;
pub mod schedule;

mod error;

pub use database::Database;
pub use documents::FieldUpdate;
pub use error::{Result, StoreError};
pub use feed::ChangeFeed;
pub use models::*;
pub use query::{Direction, Filter, OrderBy, Query};
