//! # Columnar storage for immutable analytic tables
//!
//! This crate holds the storage layer of the table engine: immutable, typed
//! columns of fixed length together with the encodings that keep them small
//! and the kernels that read them fast.
//!
//! ## Representations
//!
//! Categorical columns store dictionary indices bit-packed at five widths
//! (see [`packed`]), numeric columns use plain `f64` buffers. Any column may
//! additionally be stored sparsely (a default value plus the rows deviating
//! from it), behind a lazy row [`mapping`], or remapped into a merged
//! [`dictionary`]. All variants serve reads through the same bulk fill
//! kernels defined on [`column::Column`].
//!
//! ## Access
//!
//! Bulk access copies value ranges into caller-supplied buffers, either
//! contiguously or strided for row-major interleaving. [`reader`] adds
//! cursors for sequential consumption on top of the fill kernels.

pub mod column;
pub mod dictionary;
pub mod mapping;
pub mod packed;
pub mod reader;

mod error;

pub use self::error::{Error, Result};
