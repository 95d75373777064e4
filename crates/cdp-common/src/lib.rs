//! CDP Common Library
//!
//! Shared error handling and logging for the CDP workspace.
//!
//! - **Error Handling**: [`CdpError`] and the [`Result`] alias used by every crate
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use cdp_common::{CdpError, Result};
//!
//! fn positive(name: &str, value: usize) -> Result<usize> {
//!     if value == 0 {
//!         return Err(CdpError::config(format!("{} must be greater than 0", name)));
//!     }
//!     Ok(value)
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CdpError, Result};
