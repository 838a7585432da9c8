//! Core domain types for the easel upload service.
//!
//! This crate holds the pieces shared by the storage and server crates:
//! - Configuration types loaded from file/environment
//! - Object key derivation for stored uploads
//! - The core error type

pub mod config;
pub mod error;
pub mod upload;

pub use error::{Error, Result};

/// Default maximum accepted file size in bytes (4 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 4_000_000;
