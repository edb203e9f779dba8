//! SQLite backend for the placement record engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteStore`] holds the primary and
//! archive collections; [`SqliteMirror`] holds the mobile projection and is
//! normally opened on a separate file.

mod encode;
mod mirror;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use mirror::SqliteMirror;
pub use store::SqliteStore;
