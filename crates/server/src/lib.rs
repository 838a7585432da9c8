//! HTTP upload server for easel.
//!
//! This crate provides the HTTP surface:
//! - The streaming multipart upload endpoint
//! - The upload gate and pending buffer coordinating field validation
//!   with the file byte stream
//! - Health and metrics endpoints

pub mod buffer;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
