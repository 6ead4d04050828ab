//! Request-scoped access to the database file.

mod database;

pub use database::{Database, Session};
