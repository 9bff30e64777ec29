//! # Tether Server
//!
//! Reference document server for the tether sync engine.
//!
//! This crate provides:
//! - A single shared JSON document
//! - `GET` answered with the full document
//! - `PATCH` applying a client's operations and answering with the
//!   server-side changes queued since the client's last round
//!
//! # Protocol
//!
//! 1. Client loads the document with a bodyless request
//! 2. Client sends its edits as a JSON patch array
//! 3. Server applies them, then applies its own queued changes, and answers
//!    with those changes as a patch array (possibly empty), or with the full
//!    document when a resync was scheduled

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::DocumentServer;
