//! Owned sets of recordings.

use std::ops::Index;
use std::path::PathBuf;

use crate::archive::ArchiveWriter;
use crate::recording::Recording;
use crate::util::Result;

/// Anything that holds an ordered list of recordings.
pub trait RecordingCollection {
    fn recordings(&self) -> &[Recording];

    /// Number of recordings.
    fn count(&self) -> usize {
        self.recordings().len()
    }

    /// Archive all recordings with `writer`.
    fn archive(&self, writer: ArchiveWriter<'_>) -> Result<Option<PathBuf>> {
        writer.write(self.recordings())
    }
}

/// Ordered, owned recordings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingSet {
    recordings: Vec<Recording>,
}

impl RecordingSet {
    pub fn new(recordings: Vec<Recording>) -> Self {
        Self { recordings }
    }

    pub fn push(&mut self, recording: Recording) {
        self.recordings.push(recording);
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

    pub fn into_inner(self) -> Vec<Recording> {
        self.recordings
    }
}

impl RecordingCollection for RecordingSet {
    fn recordings(&self) -> &[Recording] {
        &self.recordings
    }
}

impl From<Vec<Recording>> for RecordingSet {
    fn from(recordings: Vec<Recording>) -> Self {
        Self::new(recordings)
    }
}

impl FromIterator<Recording> for RecordingSet {
    fn from_iter<I: IntoIterator<Item = Recording>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Index<usize> for RecordingSet {
    type Output = Recording;

    fn index(&self, index: usize) -> &Recording {
        &self.recordings[index]
    }
}

impl IntoIterator for RecordingSet {
    type Item = Recording;
    type IntoIter = std::vec::IntoIter<Recording>;

    fn into_iter(self) -> Self::IntoIter {
        self.recordings.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordingSet {
    type Item = &'a Recording;
    type IntoIter = std::slice::Iter<'a, Recording>;

    fn into_iter(self) -> Self::IntoIter {
        self.recordings.iter()
    }
}
