//! SQLite backends for Scholink: the link graph ([`SqliteStore`]) and the
//! projected relationship index ([`SqliteIndex`]).
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The engine modules are plain
//! synchronous functions over a borrowed [`rusqlite::Connection`]; the
//! store runs them inside one transaction per event.

mod coalesce;
mod documents;
mod encode;
mod events;
mod queries;
mod schema;
mod store;

pub mod assertions;
pub mod error;
pub mod grouping;
pub mod identifiers;
pub mod index;

pub use encode::payload_digest;
pub use error::{Error, Result};
pub use index::SqliteIndex;
pub use store::SqliteStore;
