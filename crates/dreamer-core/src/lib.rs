//! Core types and services for the dream journal.
//!
//! Records, the path scheme, lifecycle derivation, and the [`store`]
//! abstraction live here, together with the services built on it: the
//! [`repo::Repository`], the [`session::SessionAggregator`], the
//! [`sync::StatusSynchronizer`], and the [`interpret::Interpreter`].
//!
//! This crate is free of database dependencies. Backends implement
//! [`store::DocumentStore`] and are injected.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod association;
pub mod document;
pub mod dream;
pub mod element;
pub mod error;
pub mod hypothesis;
pub mod integration;
pub mod interpret;
pub mod lifecycle;
pub mod paths;
pub mod repo;
pub mod session;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod timestamp;
pub mod user;

pub use error::{Error, Result};
