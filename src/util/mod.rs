//! Utility types and functions for SigMF.
//!
//! - [`Error`] / [`Result`] / [`ErrorKind`] - Error handling
//! - SHA-512 helpers for checksums

mod error;
mod hash;

pub use error::*;
pub use hash::*;
