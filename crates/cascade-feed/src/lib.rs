//! The Cascade feed engine.
//!
//! Decides what a learner sees next in an endless feed sourced from a pool
//! that is refilled in the background. All state lives in a [`FeedSession`];
//! there are no globals, so several sessions can run side by side.
//!
//! The pieces, leaves first:
//!
//! - [`exclusion`] partitions pool snapshots against the learner's viewed and
//!   retry sets.
//! - [`interleave`] merges quiz and general items with a randomized minimum
//!   spacing between quizzes.
//! - [`trigger`] issues at most one generation request at a time.
//! - [`viewport`] turns visibility changes into `viewed` / `avoided` signals.
//! - [`ledger`] gives optimistic vote feedback with rollback.
//! - [`timetable`] detects a scheduled class and overrides the subject.

pub mod config;
pub mod exclusion;
pub mod interleave;
pub mod ledger;
pub mod session;
pub mod timetable;
pub mod trigger;
pub mod viewport;

pub use config::FeedConfig;
pub use session::FeedSession;

#[cfg(test)]
mod testing;
