//! Database module: models and schema for the authentication tables.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: pool wrapper with the storage operations

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbAccount, DbSession, DbUser};
pub use schema::SQLITE_INIT;
pub use sqlite::{AuthStorage, SqlitePool, connect};
