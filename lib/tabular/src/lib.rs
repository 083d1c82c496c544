//! # Tables, row writers, and vertical concatenation
//!
//! This crate assembles the storage layer of the `columnar` crate into
//! tables and provides the two ways of producing them in bulk.
//!
//! ## Producing tables
//!
//! [`writer`] materializes tables from streams of row values, buffering
//! rows per column and adaptively switching numeric columns to a sparse
//! encoding when one value dominates. [`append`] concatenates existing
//! columns or whole tables vertically, unifying categorical dictionaries
//! and reconciling their boolean markers along the way.
//!
//! ## Scheduling and observability
//!
//! The bulk operations accept an [`context::ExecutionContext`] to fan out
//! per-column work and report their progress through a monotone callback,
//! see [`progress`].

pub mod append;
pub mod context;
pub mod progress;
pub mod table;
pub mod writer;

mod error;

pub use self::error::{Error, Result};
