//! Collections - manifests binding a set of recordings by metadata hash.
//!
//! A [`Collection`] lists `(name, hash)` stream references, where the hash is
//! the SHA-512 of a recording's canonical metadata text. Because the text is
//! canonical, two metadata trees that differ only in key order hash the same.
//!
//! ## On-disk form
//!
//! ```text
//! {
//!     "collection": {
//!         "core:streams": [
//!             { "hash": "<sha512 hex>", "name": "<metadata path without extension>" },
//!             ...
//!         ],
//!         "core:version": "1.0.0"
//!     }
//! }
//! ```

mod set;

pub use set::{RecordingCollection, RecordingSet};

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::archive::{ArchiveWriter, COLLECTION_EXT, METADATA_EXT};
use crate::core::{CanonicalJson, Fields, Metadata, TextSerializer, SIGMF_VERSION};
use crate::recording::Recording;
use crate::util::{sha512_hex, Error, Result};

/// Key of the top-level collection object.
pub const COLLECTION_KEY: &str = "collection";

/// One referenced recording.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRef {
    /// Metadata path without its extension.
    pub name: String,
    /// Hex SHA-512 of the canonical metadata text.
    pub hash: String,
}

/// Collection manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "core:version")]
    pub version: String,

    #[serde(rename = "core:streams", default)]
    pub streams: Vec<StreamRef>,

    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Serialize, Deserialize)]
struct CollectionDoc {
    collection: Collection,
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Collection {
    /// Empty collection.
    pub fn new() -> Self {
        Self {
            version: SIGMF_VERSION.to_string(),
            streams: Vec::new(),
            extra: Fields::new(),
        }
    }

    /// Reference each metadata file, hashing its canonical form.
    pub fn from_metadata_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut collection = Self::new();
        for path in paths {
            let path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
                _ => Error::Io(e),
            })?;
            let metadata = Metadata::from_json(&text)?;
            let hash = sha512_hex(&CanonicalJson.serialize(&metadata.to_value()?)?);

            let text_path = path.to_string_lossy();
            let name = text_path.strip_suffix(METADATA_EXT).unwrap_or(&text_path);
            collection.add_stream(name, hash);
        }
        Ok(collection)
    }

    /// Reference in-memory recordings by name.
    pub fn from_recordings(recordings: &[Recording]) -> Result<Self> {
        let mut collection = Self::new();
        for rec in recordings {
            collection.add_stream(rec.name(), rec.metadata_hash_with(&CanonicalJson)?);
        }
        Ok(collection)
    }

    /// Parse collection text.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: CollectionDoc = serde_json::from_str(text)?;
        Ok(doc.collection)
    }

    /// Load a `.sigmf-collection` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Self::from_json(&text)
    }

    pub fn add_stream(&mut self, name: impl Into<String>, hash: impl Into<String>) {
        self.streams.push(StreamRef {
            name: name.into(),
            hash: hash.into(),
        });
    }

    /// Number of stream references.
    #[inline]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(CollectionDoc {
            collection: self.clone(),
        })?)
    }

    pub fn to_text_with(&self, serializer: &dyn TextSerializer) -> Result<Vec<u8>> {
        serializer.serialize(&self.to_value()?)
    }

    /// Write canonical collection text.
    pub fn dump(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&self.to_text_with(&CanonicalJson)?)?;
        Ok(())
    }

    /// Write to `path`, appending `.sigmf-collection` if missing.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let path = if path.to_string_lossy().ends_with(COLLECTION_EXT) {
            path.to_path_buf()
        } else {
            let mut s = path.as_os_str().to_os_string();
            s.push(COLLECTION_EXT);
            PathBuf::from(s)
        };
        fs::write(&path, self.to_text_with(&CanonicalJson)?)?;
        Ok(path)
    }

    /// Check that this collection describes exactly `recordings`.
    pub fn validate_against(&self, recordings: &[Recording]) -> Result<()> {
        self.validate_against_with(recordings, &CanonicalJson)
    }

    /// Check that the recordings' metadata hashes and the stored hashes
    /// are the same multiset.
    pub fn validate_against_with(&self, recordings: &[Recording], serializer: &dyn TextSerializer) -> Result<()> {
        if self.len() != recordings.len() {
            return Err(Error::CollectionMismatch(format!(
                "collection lists {} recordings, {} given",
                self.len(),
                recordings.len()
            )));
        }
        if self.is_empty() {
            return Err(Error::CollectionMismatch("collection has no recordings".into()));
        }

        let mut remaining: HashMap<&str, usize> = HashMap::with_capacity(self.len());
        for stream in &self.streams {
            *remaining.entry(stream.hash.as_str()).or_default() += 1;
        }
        for rec in recordings {
            let hash = rec.metadata_hash_with(serializer)?;
            match remaining.get_mut(hash.as_str()) {
                Some(n) if *n > 0 => *n -= 1,
                _ => {
                    return Err(Error::CollectionMismatch(format!(
                        "recording '{}' (hash {}) is not in the collection",
                        rec.name(),
                        hash
                    )))
                }
            }
        }
        Ok(())
    }

    /// Load every referenced recording, resolving names against `base_dir`.
    pub fn load_recordings(&self, base_dir: impl AsRef<Path>, skip_checksum: bool) -> Result<RecordingSet> {
        let base_dir = base_dir.as_ref();
        self.streams
            .iter()
            .map(|stream| Recording::from_file(base_dir.join(&stream.name), skip_checksum))
            .collect()
    }

    /// Archive this collection with its recordings loaded from `base_dir`.
    pub fn archive<'a>(&'a self, base_dir: impl AsRef<Path>, writer: ArchiveWriter<'a>) -> Result<Option<PathBuf>> {
        let recordings = self.load_recordings(base_dir, false)?;
        writer.collection(self).write(recordings.recordings())
    }
}
