//! SQLite backend for the Wayfare journey store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every multi-row write goes
//! through an `IMMEDIATE` transaction; busy/locked failures surface as a
//! retryable conflict.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
