//! Core types for the Rollcall card-reader layer.
//!
//! This crate holds the vocabulary shared by the hardware and reader crates:
//! the canonical [`Identifier`], the reader [`ConnectionState`], the
//! [`TransportKind`] tag, the [`ReaderSnapshot`] exposed to consumers, and the
//! [`ReaderError`] taxonomy.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ReaderError, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
