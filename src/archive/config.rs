//! Archive configuration shared by writer and reader.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::format::*;
use crate::core::{CanonicalJson, MetadataValidator, SchemaValidator, TextSerializer};

/// Extensions, permission bits and the validation/serialization hooks used
/// when packing and unpacking archives.
#[derive(Clone)]
pub struct ArchiveConfig {
    pub archive_ext: &'static str,
    pub metadata_ext: &'static str,
    pub dataset_ext: &'static str,
    pub collection_ext: &'static str,
    pub dir_mode: u32,
    pub file_mode: u32,
    pub validator: Arc<dyn MetadataValidator>,
    pub serializer: Arc<dyn TextSerializer>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_ext: ARCHIVE_EXT,
            metadata_ext: METADATA_EXT,
            dataset_ext: DATASET_EXT,
            collection_ext: COLLECTION_EXT,
            dir_mode: DIR_MODE,
            file_mode: FILE_MODE,
            validator: Arc::new(SchemaValidator),
            serializer: Arc::new(CanonicalJson),
        }
    }
}

impl ArchiveConfig {
    /// Process-wide standard configuration.
    pub fn standard() -> &'static ArchiveConfig {
        static STANDARD: OnceLock<ArchiveConfig> = OnceLock::new();
        STANDARD.get_or_init(ArchiveConfig::default)
    }

    /// Replace the metadata validator.
    pub fn with_validator(mut self, validator: impl MetadataValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Replace the text serializer.
    pub fn with_serializer(mut self, serializer: impl TextSerializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("archive_ext", &self.archive_ext)
            .field("metadata_ext", &self.metadata_ext)
            .field("dataset_ext", &self.dataset_ext)
            .field("collection_ext", &self.collection_ext)
            .field("dir_mode", &format_args!("{:o}", self.dir_mode))
            .field("file_mode", &format_args!("{:o}", self.file_mode))
            .finish_non_exhaustive()
    }
}
