//! Utility functions and helpers
//!
//! ## Modules
//!
//! - [`cancel`] - Cancellation token checks and racing
//! - [`io`] - Chunked reading from async byte sources

pub mod cancel;
pub mod io;
