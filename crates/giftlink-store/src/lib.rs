//! # giftlink-store
//!
//! Durable storage for users, their close people, and accepted
//! invitations.
//!
//! The [`Store`] trait is the single persistence contract used by the
//! server. Two interchangeable backends implement it:
//!
//! - [`Database`]: embedded SQLite file (via `rusqlite`), the default
//! - [`PgStore`]: networked PostgreSQL (via `postgres`)
//!
//! Both backends are synchronous and internally serialized; async callers
//! should drive them from a blocking task.

pub mod close_people;
pub mod database;
pub mod invitations;
pub mod migrations;
pub mod models;
pub mod pg_store;
pub mod store;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use pg_store::PgStore;
pub use store::{open_store, Store, StoreBackend};
