//! Core types and trait definitions for Cascade, the short-form learning feed.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! feed engine, the storage backend, the API and the terminal client all
//! depend on it.

pub mod backend;
pub mod engagement;
pub mod error;
pub mod item;
pub mod learner;
pub mod store;

pub use error::{Error, Result};

/// Subject used when a learner has no enrolled subjects and none was chosen.
pub const GENERIC_SUBJECT: &str = "general knowledge";
