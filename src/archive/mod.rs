//! Archive layer - packing recordings into `.sigmf` tar containers.
//!
//! This module provides:
//! - [`ArchiveWriter`] - Packs recordings and an optional collection manifest
//! - [`ArchiveReader`] - Exposes packed recordings without extracting them
//! - [`ArchiveConfig`] - Extensions, permissions and validation hooks
//!
//! ## Example
//!
//! ```ignore
//! use sigmf::archive::{ArchiveReader, ArchiveWriter};
//!
//! let path = ArchiveWriter::new().path("run").write(&recordings)?;
//! let reader = ArchiveReader::open("run.sigmf")?;
//! for rec in &reader {
//!     println!("{}: {} samples", rec.name(), rec.count_samples()?);
//! }
//! ```

mod config;
mod format;
mod reader;
mod writer;

pub use config::ArchiveConfig;
pub use format::*;
pub use reader::{ArchiveReader, ArchiveReaderOptions};
pub use writer::{normalize_path, ArchiveSink, ArchiveWriter};
