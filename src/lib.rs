//! # SigMF
//!
//! Rust implementation of the Signal Metadata Format: recorded sample data
//! paired with JSON metadata describing its global properties, captures and
//! annotations, packed into `.sigmf` tar archives.
//!
//! ## Modules
//!
//! - [`util`] - Errors and hashing helpers
//! - [`core`] - Datatypes, metadata model, capture index and sample decoding
//! - [`recording`] - Recordings and dataset byte access
//! - [`collection`] - Collection manifests and recording sets
//! - [`archive`] - Archive writer and in-place archive reader
//!
//! ## Example
//!
//! ```ignore
//! use sigmf::prelude::*;
//!
//! let recordings = sigmf::from_archive("capture.sigmf")?;
//! for rec in &recordings {
//!     let samples = rec.read_samples(0, None, SampleOptions::default())?;
//!     println!("{}: {:?}", rec.name(), samples.shape());
//! }
//! ```

pub mod archive;
pub mod collection;
pub mod core;
pub mod recording;
pub mod util;

use std::path::Path;

// Re-export commonly used types
pub use archive::{ArchiveConfig, ArchiveReader, ArchiveReaderOptions, ArchiveSink, ArchiveWriter};
pub use collection::{Collection, RecordingCollection, RecordingSet};
pub use recording::{Dataset, Recording};
pub use util::{Error, ErrorKind, Result};

/// Read every recording in an archive.
pub fn from_archive(path: impl AsRef<Path>) -> Result<RecordingSet> {
    Ok(ArchiveReader::open(path)?.into_recordings())
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archive::{ArchiveConfig, ArchiveReader, ArchiveReaderOptions, ArchiveSink, ArchiveWriter};
    pub use crate::collection::{Collection, RecordingCollection, RecordingSet};
    pub use crate::core::{
        Annotation, Capture, DataType, Fields, Metadata, SampleOptions, Samples, DATATYPE_KEY, NUM_CHANNELS_KEY,
        SAMPLE_RATE_KEY,
    };
    pub use crate::recording::{Dataset, Recording};
    pub use crate::util::{Error, ErrorKind, Result};
}
