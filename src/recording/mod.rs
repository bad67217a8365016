//! Recording - one metadata tree bound to one dataset.
//!
//! A [`Recording`] is built fresh in memory, loaded from a `.sigmf-meta` /
//! `.sigmf-data` pair, or produced by the archive reader with a dataset that
//! views bytes still packed inside the container.
//!
//! ```ignore
//! use sigmf::prelude::*;
//!
//! let mut rec = Recording::new("capture");
//! rec.set_global_field(DATATYPE_KEY, "cf32_le".into())?;
//! rec.set_data_file("capture.sigmf-data", false)?;
//! rec.add_capture(0, Fields::new());
//! let samples = rec.read_samples(0, Some(1024), SampleOptions::default())?;
//! ```

mod dataset;

pub use dataset::{DataSource, Dataset, DatasetReader};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::archive::{ArchiveSink, ArchiveWriter, METADATA_EXT};
use crate::core::{
    decode, Annotation, CanonicalJson, Capture, CaptureIndex, DataType, Fields, Metadata, MetadataValidator,
    SampleOptions, Samples, SchemaValidator, TextSerializer,
};
use crate::util::{sha512_hex, Error, Result};

/// One metadata tree plus an optional bound dataset.
///
/// Equality compares metadata only; dataset bytes are not part of it.
#[derive(Clone, Debug)]
pub struct Recording {
    name: String,
    metadata: Metadata,
    dataset: Option<Dataset>,
}

impl PartialEq for Recording {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
    }
}

impl Recording {
    /// Fresh recording with default global fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_metadata(name, Metadata::new())
    }

    pub fn with_metadata(name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            name: name.into(),
            metadata,
            dataset: None,
        }
    }

    /// Parse metadata text.
    pub fn from_json(name: impl Into<String>, text: &str) -> Result<Self> {
        Ok(Self::with_metadata(name, Metadata::from_json(text)?))
    }

    /// Load a `.sigmf-meta` file and bind the sibling `.sigmf-data` if present.
    ///
    /// `path` may name the metadata file or the shared base path.
    pub fn from_file(path: impl AsRef<Path>, skip_checksum: bool) -> Result<Self> {
        let base = strip_metadata_ext(path.as_ref());
        let meta_path = append_ext(&base, METADATA_EXT);
        let text = fs::read_to_string(&meta_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(meta_path.clone()),
            _ => Error::Io(e),
        })?;

        let name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut rec = Self::from_json(name, &text)?;

        let data_path = append_ext(&base, crate::archive::DATASET_EXT);
        if data_path.is_file() {
            rec.set_data_file(&data_path, skip_checksum)?;
        } else {
            tracing::debug!(path = %data_path.display(), "no dataset next to metadata");
        }
        Ok(rec)
    }

    // ========================================================================
    // Naming and metadata access
    // ========================================================================

    /// Identifier used for archive member names.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[inline]
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    #[inline]
    pub fn captures(&self) -> &[Capture] {
        &self.metadata.captures
    }

    #[inline]
    pub fn annotations(&self) -> &[Annotation] {
        &self.metadata.annotations
    }

    /// Set a global field. Typed `core:` keys are type checked.
    pub fn set_global_field(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        self.metadata.global.set(key, value)
    }

    pub fn global_field(&self, key: &str) -> Option<Value> {
        self.metadata.global.get(key)
    }

    /// Add a capture, merging into an existing one at the same start.
    pub fn add_capture(&mut self, sample_start: u64, fields: Fields) {
        self.metadata.add_capture(sample_start, fields);
    }

    /// Add an annotation; `sample_count` of `None` runs to the end.
    pub fn add_annotation(&mut self, sample_start: u64, sample_count: Option<u64>, fields: Fields) {
        self.metadata.add_annotation(sample_start, sample_count, fields);
    }

    /// Annotations covering sample `index`.
    pub fn annotations_at(&self, index: u64) -> Vec<&Annotation> {
        self.metadata.annotations.iter().filter(|a| a.covers(index)).collect()
    }

    /// Position of the capture owning sample `index`, if any.
    ///
    /// With duplicate starts the last capture wins, matching byte layout.
    pub fn capture_at(&self, index: u64) -> Option<usize> {
        let pos = self.metadata.captures.partition_point(|c| c.sample_start <= index);
        pos.checked_sub(1)
    }

    /// Sample start of capture `index`.
    pub fn capture_start(&self, index: usize) -> Result<u64> {
        self.metadata
            .captures
            .get(index)
            .map(|c| c.sample_start)
            .ok_or(Error::CaptureOutOfBounds {
                index,
                count: self.metadata.captures.len(),
            })
    }

    pub fn data_type(&self) -> Result<DataType> {
        self.metadata.global.data_type()
    }

    #[inline]
    pub fn num_channels(&self) -> u64 {
        self.metadata.global.num_channels()
    }

    /// Bytes per sample across all channels.
    pub fn sample_size(&self) -> Result<u64> {
        Ok(self.data_type()?.sample_bytes() as u64 * self.num_channels())
    }

    // ========================================================================
    // Dataset binding
    // ========================================================================

    /// Bind a dataset.
    ///
    /// Unless `skip_checksum` is set, the dataset is hashed: a stored
    /// `core:sha512` must match, otherwise the computed hash is stored.
    pub fn set_dataset(&mut self, dataset: Dataset, skip_checksum: bool) -> Result<()> {
        if !skip_checksum {
            let actual = dataset.sha512()?;
            match &self.metadata.global.sha512 {
                Some(expected) if !expected.eq_ignore_ascii_case(&actual) => {
                    return Err(Error::ChecksumMismatch {
                        name: self.name.clone(),
                        expected: expected.clone(),
                        actual,
                    });
                }
                _ => self.metadata.global.sha512 = Some(actual),
            }
        }
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Bind a dataset file.
    pub fn set_data_file(&mut self, path: impl AsRef<Path>, skip_checksum: bool) -> Result<()> {
        self.set_dataset(Dataset::open(path)?, skip_checksum)
    }

    #[inline]
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    #[inline]
    pub fn has_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    fn require_dataset(&self) -> Result<&Dataset> {
        self.dataset
            .as_ref()
            .ok_or_else(|| Error::file(format!("recording '{}' has no dataset", self.name)))
    }

    /// Hash the bound dataset and store the result in `core:sha512`.
    pub fn calculate_hash(&mut self) -> Result<String> {
        let hash = self.require_dataset()?.sha512()?;
        self.metadata.global.sha512 = Some(hash.clone());
        Ok(hash)
    }

    // ========================================================================
    // Validation and serialization
    // ========================================================================

    /// Validate metadata with the built-in schema checks.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&SchemaValidator)
    }

    pub fn validate_with(&self, validator: &dyn MetadataValidator) -> Result<()> {
        let tree = self.metadata.to_value()?;
        validator
            .validate(&tree)
            .map_err(|reason| Error::validation(&self.name, reason))
    }

    /// Serialized metadata text.
    pub fn to_text_with(&self, serializer: &dyn TextSerializer) -> Result<Vec<u8>> {
        serializer.serialize(&self.metadata.to_value()?)
    }

    /// Hex SHA-512 of the canonical metadata text.
    pub fn metadata_hash_with(&self, serializer: &dyn TextSerializer) -> Result<String> {
        Ok(sha512_hex(&self.to_text_with(serializer)?))
    }

    /// Write canonical metadata text.
    pub fn dump(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&self.to_text_with(&CanonicalJson)?)?;
        Ok(())
    }

    /// Write canonical metadata to `<base>.sigmf-meta`.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let meta_path = append_ext(&strip_metadata_ext(path.as_ref()), METADATA_EXT);
        fs::write(&meta_path, self.to_text_with(&CanonicalJson)?)?;
        Ok(meta_path)
    }

    /// Archive this recording alone at `path`.
    pub fn archive(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        ArchiveWriter::new()
            .path(path)
            .write(std::slice::from_ref(self))?
            .ok_or_else(|| Error::file("archive writer returned no path"))
    }

    /// Archive this recording into a caller-owned sink.
    pub fn archive_into(&self, sink: &mut dyn ArchiveSink) -> Result<()> {
        ArchiveWriter::new().sink(sink).write(std::slice::from_ref(self))?;
        Ok(())
    }

    // ========================================================================
    // Sample access
    // ========================================================================

    fn index(&self) -> Result<CaptureIndex<'_>> {
        let dataset = self.require_dataset()?;
        Ok(CaptureIndex::new(
            &self.metadata.captures,
            self.sample_size()?,
            dataset.len(),
            self.metadata.global.trailing_bytes(),
        ))
    }

    /// Number of samples.
    ///
    /// Without a dataset this is the furthest bounded annotation end.
    pub fn count_samples(&self) -> Result<u64> {
        if self.dataset.is_none() {
            return Ok(self.metadata.annotation_extent());
        }
        let count = self.index()?.count_samples();
        let extent = self.metadata.annotation_extent();
        if extent > count {
            tracing::warn!(
                name = %self.name,
                count,
                extent,
                "annotations extend past the end of the dataset"
            );
        }
        Ok(count)
    }

    /// True when sample `i` lives at byte `i * sample_size`.
    pub fn is_conforming_dataset(&self) -> bool {
        self.metadata.global.trailing_bytes() == 0 && self.metadata.captures.iter().all(|c| c.header_bytes() == 0)
    }

    /// Half-open byte range owned by capture `index`.
    pub fn capture_byte_boundaries(&self, index: usize) -> Result<(u64, u64)> {
        self.index()?.byte_boundaries(index)
    }

    fn decode(&self, bytes: &[u8], opts: SampleOptions) -> Result<Samples> {
        decode(bytes, &self.data_type()?, self.num_channels() as usize, opts)
    }

    /// Read samples `[start, start + count)` across captures.
    ///
    /// `count` of `None` reads to the end of the dataset.
    pub fn read_samples(&self, start: u64, count: Option<u64>, opts: SampleOptions) -> Result<Samples> {
        let dataset = self.require_dataset()?;
        let index = self.index()?;
        let total = index.count_samples();
        let count = match count {
            Some(n) => n,
            None => total.checked_sub(start).ok_or(Error::SampleOutOfBounds {
                start,
                end: start,
                count: total,
            })?,
        };
        if !index.is_conforming() {
            tracing::warn!(name = %self.name, "reading non-conforming dataset, header and trailing bytes skipped");
        }

        let ranges = index.locate(start, count)?;
        let size: u64 = ranges.iter().map(|r| r.end - r.start).sum();
        let mut bytes = Vec::with_capacity(size as usize);
        for range in ranges {
            bytes.extend_from_slice(&dataset.read_range(range)?);
        }
        self.decode(&bytes, opts)
    }

    /// Read samples from one capture, starting `relative_start` samples in.
    ///
    /// Requests running past the end of the capture are truncated to it.
    pub fn read_samples_in_capture(
        &self,
        index: usize,
        relative_start: u64,
        count: Option<u64>,
        opts: SampleOptions,
    ) -> Result<Samples> {
        let dataset = self.require_dataset()?;
        let range = self.index()?.capture_range(index, relative_start, count)?;
        self.decode(&dataset.read_range(range)?, opts)
    }
}

/// `path` without a trailing `.sigmf-meta`.
fn strip_metadata_ext(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    match text.strip_suffix(METADATA_EXT) {
        Some(base) => PathBuf::from(base),
        None => path.to_path_buf(),
    }
}

fn append_ext(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DATATYPE_KEY;
    use serde_json::json;

    fn u16_recording(values: impl IntoIterator<Item = u16>, datatype: &str, channels: u64) -> Recording {
        let bytes: Vec<u8> = values.into_iter().flat_map(u16::to_le_bytes).collect();
        let mut rec = Recording::new("test");
        rec.set_global_field(DATATYPE_KEY, json!(datatype)).unwrap();
        rec.set_global_field("core:num_channels", json!(channels)).unwrap();
        rec.set_dataset(Dataset::from_bytes(bytes), false).unwrap();
        rec
    }

    #[test]
    fn test_default_constructor() {
        let rec = Recording::new("test");
        assert_eq!(rec.name(), "test");
        assert_eq!(rec.num_channels(), 1);
        assert!(!rec.has_dataset());
    }

    #[test]
    fn test_set_non_schema_global_field() {
        let mut rec = Recording::new("test");
        rec.set_global_field("this_is:not_in_the_schema", Value::Null).unwrap();
        assert_eq!(rec.global_field("this_is:not_in_the_schema"), Some(Value::Null));
    }

    #[test]
    fn test_annotations_with_duplicate_key() {
        let mut rec = Recording::new("test");
        rec.add_capture(0, Fields::new());
        let mut m1 = Fields::new();
        m1.insert("latitude".into(), json!(40.0));
        let mut m2 = Fields::new();
        m2.insert("latitude".into(), json!(50.0));
        rec.add_annotation(0, Some(128), m1);
        rec.add_annotation(0, Some(128), m2);
        assert_eq!(rec.annotations_at(64).len(), 2);
        assert!(rec.annotations_at(128).is_empty());
    }

    #[test]
    fn test_multiple_captures_and_annotations() {
        let mut rec = Recording::new("test");
        for n in 0..3u64 {
            let mut fields = Fields::new();
            fields.insert("core:datetime".into(), json!(format!("2024-01-0{}T00:00:00Z", n + 1)));
            rec.add_capture(1024 * n, fields);
            rec.add_annotation(1024 * n, Some(1024), Fields::new());
        }
        assert_eq!(rec.captures().len(), 3);
        assert_eq!(rec.capture_at(2000), Some(1));
        assert_eq!(rec.capture_start(2).unwrap(), 2048);
        assert!(rec.capture_start(3).is_err());
        assert_eq!(rec.count_samples().unwrap(), 3072);
    }

    #[test]
    fn test_multichannel_seek() {
        let rec = u16_recording(0..18, "cu16_le", 3);
        let samples = rec.read_samples(1, None, SampleOptions::unscaled()).unwrap();
        let a = samples.as_complex().unwrap();
        assert_eq!(a.shape(), &[2, 3]);
        assert_eq!(a[[0, 0]].re, 6.0);
        assert_eq!(a[[0, 0]].im, 7.0);
        assert_eq!(a[[1, 0]].re, 12.0);
        assert_eq!(a[[1, 0]].im, 13.0);
    }

    #[test]
    fn test_hash_stored_and_checked() {
        let mut rec = u16_recording(0..8, "ri16_le", 1);
        let hash = rec.metadata().global.sha512.clone().unwrap();
        assert_eq!(hash.len(), 128);

        let other: Vec<u8> = vec![0xff; 16];
        let err = rec.set_dataset(Dataset::from_bytes(other.clone()), false).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
        assert!(err.is_validation());

        rec.set_dataset(Dataset::from_bytes(other), true).unwrap();
        assert_eq!(rec.metadata().global.sha512.as_deref(), Some(hash.as_str()));
        assert_ne!(rec.calculate_hash().unwrap(), hash);
    }

    #[test]
    fn test_equality_ignores_dataset() {
        let a = u16_recording(0..8, "ri16_le", 1);
        let mut b = a.clone();
        b.set_dataset(Dataset::from_bytes(vec![9; 3]), true).unwrap();
        b.set_name("other");
        assert_eq!(a, b);
        b.add_annotation(0, None, Fields::new());
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_reports_name() {
        let rec = Recording::new("nodtype");
        let err = rec.validate().unwrap_err();
        match err {
            Error::Validation { name, reason } => {
                assert_eq!(name, "nodtype");
                assert!(reason.contains("core:datatype"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_read_without_dataset_is_file_error() {
        let mut rec = Recording::new("x");
        rec.set_global_field(DATATYPE_KEY, json!("ru8")).unwrap();
        assert!(rec.read_samples(0, None, SampleOptions::default()).unwrap_err().is_file());
    }

    #[test]
    fn test_strip_metadata_ext() {
        assert_eq!(strip_metadata_ext(Path::new("a/b.sigmf-meta")), PathBuf::from("a/b"));
        assert_eq!(strip_metadata_ext(Path::new("a/b")), PathBuf::from("a/b"));
        assert_eq!(append_ext(Path::new("a/b"), ".sigmf-data"), PathBuf::from("a/b.sigmf-data"));
    }
}
