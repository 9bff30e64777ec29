//! # Tether Patch
//!
//! Patch operations and the diff/apply pair for tether.
//!
//! This crate provides:
//! - `Pointer` for slash-delimited paths into a JSON document
//! - `PatchOp` (`add`, `remove`, `replace`) and its JSON wire codec
//! - `diff` to compute an ordered patch between two documents
//! - `apply_patch` to replay a patch onto a live document
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Ordering
//!
//! Operations are applied strictly in sequence. Array removals shift the
//! indices of later elements, so `diff` emits array removals from the highest
//! index down and `apply_patch` resolves every index against the document as
//! it stands when the operation runs.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod diff;
mod error;
mod operation;
mod pointer;

pub use apply::{apply_op, apply_patch, resolve};
pub use diff::diff;
pub use error::{PatchError, PatchResult};
pub use operation::{decode_patch, encode_patch, OpKind, PatchOp};
pub use pointer::Pointer;
