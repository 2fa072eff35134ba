//! Core types and trait definitions for the Scholink link broker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the relationship graph vocabulary, the metadata documents attached
//! to groups and group edges, the projected index documents, and the two
//! storage abstractions ([`graph::GraphStore`], [`index::SearchIndex`]) that
//! the event processor and the index projector are written against.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod assertion;
pub mod compact;
pub mod document;
pub mod error;
pub mod event;
pub mod graph;
pub mod group;
pub mod identifier;
pub mod index;
pub mod metadata;
pub mod processor;
pub mod projector;
pub mod query;
pub mod relation;

pub use error::{Error, Failure, Result};
