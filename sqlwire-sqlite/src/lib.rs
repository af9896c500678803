//! # sqlwire-sqlite
//!
//! SQLite adapter for sqlwire.
//!
//! This crate provides:
//! - A [`Database`] handle over a bundled SQLite connection
//! - Binding of [`Value`](sqlwire_protocol::Value) arguments to statements
//! - Materialization of selected rows into a [`ResultSet`](sqlwire_protocol::ResultSet)
//! - Table-level insert/update helpers driven by a [`Row`](sqlwire_protocol::Row)

pub mod database;
pub mod error;
pub mod mapping;

pub use database::{Database, IN_MEMORY, SQLITE_HEADER};
pub use error::DatabaseError;
