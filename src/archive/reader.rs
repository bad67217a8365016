//! Archive reader.
//!
//! Members are scanned in one forward pass. Metadata members are buffered,
//! dataset members are only located: each recording's dataset is a
//! [`Dataset`] view `(container, offset, size)` over the still-packed archive.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::config::ArchiveConfig;
use super::format::member_stem;
use crate::collection::{Collection, RecordingCollection, RecordingSet};
use crate::recording::{DataSource, Dataset, Recording};
use crate::util::{Error, Result};

/// Options for opening an archive.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveReaderOptions<'a> {
    config: &'a ArchiveConfig,
    skip_checksum: bool,
    use_mmap: bool,
}

impl Default for ArchiveReaderOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ArchiveReaderOptions<'a> {
    pub fn new() -> Self {
        Self::with_config(ArchiveConfig::standard())
    }

    pub fn with_config(config: &'a ArchiveConfig) -> Self {
        Self {
            config,
            skip_checksum: false,
            use_mmap: true,
        }
    }

    /// Do not hash datasets against their stored `core:sha512`.
    pub fn skip_checksum(mut self, skip: bool) -> Self {
        self.skip_checksum = skip;
        self
    }

    /// Memory-map the archive (default) or use buffered reads.
    pub fn use_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Open an archive file.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<ArchiveReader> {
        let path = path.as_ref();
        let ext = self.config.archive_ext;
        if !path.to_string_lossy().ends_with(ext) {
            return Err(Error::ExtensionMismatch {
                path: path.to_path_buf(),
                expected: ext.to_string(),
                actual: super::format::extension_of(path).unwrap_or_default(),
            });
        }
        let source = Arc::new(DataSource::open_opts(path, self.use_mmap)?);
        let mut reader = self.scan(source)?;
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }

    /// Read an archive held in memory.
    pub fn from_bytes(&self, bytes: Vec<u8>) -> Result<ArchiveReader> {
        self.scan(Arc::new(DataSource::from_bytes(bytes)))
    }

    fn scan(&self, source: Arc<DataSource>) -> Result<ArchiveReader> {
        let stream = Dataset::whole(source.clone()).reader();
        self.scan_stream(source, stream)
    }

    /// Walk the members of `stream`, a reader over `source` from offset 0.
    ///
    /// Dataset member bodies are seeked over; only headers and metadata
    /// members are read.
    fn scan_stream<R: Read + Seek>(&self, source: Arc<DataSource>, stream: R) -> Result<ArchiveReader> {
        let config = self.config;
        let mut archive = tar::Archive::new(stream);

        // Pending halves of metadata/dataset pairs, keyed by member path without extension.
        let mut pending_meta: HashMap<String, (String, String)> = HashMap::new();
        let mut pending_data: HashMap<String, (u64, u64)> = HashMap::new();
        let mut recordings = Vec::new();
        let mut collection: Option<Collection> = None;
        let mut data_found = false;

        for entry in archive.entries_with_seek()? {
            let mut entry = entry?;
            let kind = entry.header().entry_type();
            let member = entry.path()?.to_string_lossy().into_owned();

            if kind.is_dir() {
                continue;
            }
            if !kind.is_file() {
                tracing::warn!(member = %member, kind = ?kind, "ignoring archive member of unhandled type");
                continue;
            }

            let key = if let Some(key) = member.strip_suffix(config.metadata_ext) {
                let mut text = String::new();
                entry.read_to_string(&mut text)?;
                let name = member_stem(&member, config.metadata_ext).unwrap_or_default().to_string();
                pending_meta.insert(key.to_string(), (name, text));
                key.to_string()
            } else if let Some(key) = member.strip_suffix(config.dataset_ext) {
                pending_data.insert(key.to_string(), (entry.raw_file_position(), entry.size()));
                data_found = true;
                key.to_string()
            } else if member.ends_with(config.collection_ext) {
                let mut text = String::new();
                entry.read_to_string(&mut text)?;
                if collection.is_some() {
                    tracing::warn!(member = %member, "ignoring additional collection member");
                } else {
                    collection = Some(Collection::from_json(&text)?);
                }
                continue;
            } else {
                tracing::warn!(member = %member, "ignoring unrecognised archive member");
                continue;
            };

            if !(pending_meta.contains_key(&key) && pending_data.contains_key(&key)) {
                continue;
            }
            let (Some((name, text)), Some((offset, size))) = (pending_meta.remove(&key), pending_data.remove(&key))
            else {
                continue;
            };
            let mut rec = Recording::from_json(name, &text)?;
            rec.validate_with(config.validator.as_ref())?;
            rec.set_dataset(Dataset::view(source.clone(), offset, size)?, self.skip_checksum)?;
            tracing::debug!(name = rec.name(), offset, size, "bound recording to archive member");
            recordings.push(rec);
        }

        for key in pending_meta.keys() {
            tracing::warn!(member = %key, "metadata member without matching dataset");
        }
        for key in pending_data.keys() {
            tracing::warn!(member = %key, "dataset member without matching metadata");
        }
        if !data_found {
            return Err(Error::file(format!("no {} member found in archive", config.dataset_ext)));
        }

        Ok(ArchiveReader {
            recordings,
            collection,
            path: None,
        })
    }
}

/// Recordings read from an archive without extracting it.
#[derive(Debug)]
pub struct ArchiveReader {
    recordings: Vec<Recording>,
    collection: Option<Collection>,
    path: Option<PathBuf>,
}

impl ArchiveReader {
    /// Open an archive with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        ArchiveReaderOptions::new().open(path)
    }

    /// Read an in-memory archive with default options.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        ArchiveReaderOptions::new().from_bytes(bytes)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Recording> {
        self.recordings.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recording> {
        self.recordings.iter()
    }

    /// Collection manifest, if the archive holds one.
    pub fn collection(&self) -> Option<&Collection> {
        self.collection.as_ref()
    }

    /// Path the archive was opened from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn into_recordings(self) -> RecordingSet {
        RecordingSet::new(self.recordings)
    }
}

impl RecordingCollection for ArchiveReader {
    fn recordings(&self) -> &[Recording] {
        &self.recordings
    }
}

impl Index<usize> for ArchiveReader {
    type Output = Recording;

    fn index(&self, index: usize) -> &Recording {
        &self.recordings[index]
    }
}

impl<'a> IntoIterator for &'a ArchiveReader {
    type Item = &'a Recording;
    type IntoIter = std::slice::Iter<'a, Recording>;

    fn into_iter(self) -> Self::IntoIter {
        self.recordings.iter()
    }
}
