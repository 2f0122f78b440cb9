//! SQLite backend for Marquee.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements every
//! storage trait in `marquee-core`.

mod chain;
mod encode;
mod schema;
mod store;

pub mod error;

pub use chain::{ChainReport, compute_integrity_hash};
pub use error::{Error, Result};
pub use store::SqliteStore;
