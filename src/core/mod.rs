//! Core layer - the recording data model.
//!
//! This module provides:
//! - [`DataType`] - Parsed sample datatype descriptors
//! - [`Metadata`] - Global info, captures and annotations
//! - [`CaptureIndex`] - Sample index to byte range mapping
//! - [`decode`] - Byte slices to [`Samples`]
//! - [`MetadataValidator`] / [`TextSerializer`] - Pluggable validation and canonical text
//!
//! Nothing in here performs I/O.

mod datatype;
mod decode;
mod index;
mod metadata;
mod serialize;
mod validate;

pub use datatype::{ComponentFormat, DataType, Endianness};
pub use decode::{decode, SampleOptions, Samples};
pub use index::CaptureIndex;
pub use metadata::*;
pub use serialize::{CanonicalJson, TextSerializer};
pub use validate::{MetadataValidator, SchemaValidator};
