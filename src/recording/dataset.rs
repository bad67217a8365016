//! Dataset byte access.
//!
//! A [`DataSource`] is an open, read-only byte source: a memory map, a file
//! handle, or an owned buffer. A [`Dataset`] is a bounded view
//! `(source, offset, len)` over a shared source; several datasets may view
//! disjoint ranges of the same source, which is how recordings read from an
//! archive address their bytes without extracting them.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::RwLock;

use crate::util::{sha512_hex_reader, Error, Result};

/// Shared read-only byte source.
pub struct DataSource {
    inner: SourceInner,
    size: u64,
}

enum SourceInner {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Buffered file access (fallback)
    File(RwLock<File>),
    /// Owned bytes
    Memory(Vec<u8>),
}

impl DataSource {
    /// Open a file with memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let size = file.metadata()?.len();

        // Zero-length files cannot be mapped.
        let inner = if use_mmap && size > 0 {
            // Safety: mapped read-only; callers must not truncate the file while it is open.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            SourceInner::Mmap(mmap)
        } else {
            SourceInner::File(RwLock::new(file))
        };
        tracing::debug!(path = %path.display(), size, mmap = matches!(inner, SourceInner::Mmap(_)), "opened data source");
        Ok(Self { inner, size })
    }

    /// Wrap an owned buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            inner: SourceInner::Memory(bytes),
            size,
        }
    }

    /// Total size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    fn check(&self, pos: u64, len: usize) -> Result<()> {
        match pos.checked_add(len as u64) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::UnexpectedEof(pos.saturating_add(len as u64))),
        }
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.check(pos, buf.len())?;
        let start = pos as usize;
        match &self.inner {
            SourceInner::Mmap(mmap) => buf.copy_from_slice(&mmap[start..start + buf.len()]),
            SourceInner::Memory(bytes) => buf.copy_from_slice(&bytes[start..start + buf.len()]),
            SourceInner::File(file) => {
                let mut f = file.write();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
            }
        }
        Ok(())
    }

    /// Read bytes at a specific position.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            SourceInner::Mmap(_) => "mmap",
            SourceInner::File(_) => "file",
            SourceInner::Memory(_) => "memory",
        };
        f.debug_struct("DataSource").field("kind", &kind).field("size", &self.size).finish()
    }
}

/// Bounded view over a [`DataSource`].
#[derive(Clone, Debug)]
pub struct Dataset {
    source: Arc<DataSource>,
    offset: u64,
    len: u64,
}

impl Dataset {
    /// Dataset covering a whole file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Dataset covering a whole file, optionally without memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        Ok(Self::whole(Arc::new(DataSource::open_opts(path, use_mmap)?)))
    }

    /// Dataset over an owned buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::whole(Arc::new(DataSource::from_bytes(bytes)))
    }

    /// Dataset covering all of `source`.
    pub fn whole(source: Arc<DataSource>) -> Self {
        let len = source.size();
        Self { source, offset: 0, len }
    }

    /// View `len` bytes of `source` starting at `offset`.
    pub fn view(source: Arc<DataSource>, offset: u64, len: u64) -> Result<Self> {
        match offset.checked_add(len) {
            Some(end) if end <= source.size() => Ok(Self { source, offset, len }),
            _ => Err(Error::UnexpectedEof(offset.saturating_add(len))),
        }
    }

    /// Length of the view in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the view within its source.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    /// Read a byte range relative to the start of the view.
    pub fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>> {
        if range.start > range.end || range.end > self.len {
            return Err(Error::UnexpectedEof(range.end));
        }
        self.source
            .read_bytes(self.offset + range.start, (range.end - range.start) as usize)
    }

    /// Read the whole view.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.read_range(0..self.len)
    }

    /// Streaming reader over the view.
    pub fn reader(&self) -> DatasetReader {
        DatasetReader {
            dataset: self.clone(),
            pos: 0,
        }
    }

    /// Hex SHA-512 of the view.
    pub fn sha512(&self) -> Result<String> {
        Ok(sha512_hex_reader(self.reader())?)
    }
}

/// `Read + Seek` cursor over a [`Dataset`].
#[derive(Debug)]
pub struct DatasetReader {
    dataset: Dataset,
    pos: u64,
}

impl Read for DatasetReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.dataset.len.saturating_sub(self.pos);
        let n = (buf.len() as u64).min(remaining) as usize;
        if n == 0 {
            return Ok(0);
        }
        self.dataset
            .source
            .read_into(self.dataset.offset + self.pos, &mut buf[..n])
            .map_err(|e| match e {
                Error::Io(io) => io,
                other => io::Error::new(io::ErrorKind::UnexpectedEof, other.to_string()),
            })?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for DatasetReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.dataset.len.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of dataset")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_view_bounds() {
        let source = Arc::new(DataSource::from_bytes((0..100).collect()));
        let view = Dataset::view(source.clone(), 10, 20).unwrap();
        assert_eq!(view.read_range(0..3).unwrap(), vec![10, 11, 12]);
        assert!(view.read_range(15..25).is_err());
        assert!(Dataset::view(source, 90, 11).is_err());
    }

    #[test]
    fn test_reader_and_seek() {
        let data = Dataset::view(Arc::new(DataSource::from_bytes((0..64).collect())), 32, 16).unwrap();
        let mut reader = data.reader();
        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, (32..48).collect::<Vec<u8>>());

        reader.seek(SeekFrom::End(-2)).unwrap();
        let mut tail = Vec::new();
        reader.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, vec![46, 47]);
        assert!(reader.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_file_modes_agree() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(&(0..=255).collect::<Vec<u8>>())?;
        tmp.flush()?;

        let mapped = Dataset::open(tmp.path())?;
        let buffered = Dataset::open_opts(tmp.path(), false)?;
        assert_eq!(mapped.len(), 256);
        assert_eq!(mapped.read_range(100..110)?, buffered.read_range(100..110)?);
        assert_eq!(mapped.sha512()?, buffered.sha512()?);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = Dataset::open("/definitely/not/here.sigmf-data").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_empty_file_opens() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        let data = Dataset::open(tmp.path())?;
        assert!(data.is_empty());
        assert_eq!(data.read_all()?, Vec::<u8>::new());
        Ok(())
    }
}
