//! Archive writer.
//!
//! ## Container layout
//!
//! ```text
//! <archive>.sigmf-collection          optional manifest
//! <name>/                             one directory per recording (0755)
//! <name>/<name>.sigmf-data            raw dataset bytes (0644)
//! <name>/<name>.sigmf-meta            canonical metadata text (0644)
//! ...
//! ```
//!
//! Every input is checked before the target is opened, so a validation
//! failure never leaves a partial archive behind. Path targets are written to
//! a temporary file next to the destination and moved into place on success.

use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tar::{Builder, EntryType, Header};

use super::config::ArchiveConfig;
use super::format::*;
use crate::collection::Collection;
use crate::recording::{Dataset, Recording};
use crate::util::{Error, Result};

/// Caller-owned byte sink an archive can be written into.
///
/// It must be readable and seekable so existing archives can be appended to.
pub trait ArchiveSink: Read + Write + Seek {}

impl<T: Read + Write + Seek + ?Sized> ArchiveSink for T {}

enum Payload<'r> {
    Dir,
    Text(Vec<u8>),
    Data(&'r Dataset),
}

struct Member<'r> {
    path: String,
    payload: Payload<'r>,
}

enum Target<'a> {
    Path(PathBuf),
    Sink(&'a mut dyn ArchiveSink),
}

/// Builder that packs recordings (and optionally a collection) into one archive.
///
/// Exactly one of [`path`](Self::path) or [`sink`](Self::sink) must be set.
pub struct ArchiveWriter<'a> {
    config: &'a ArchiveConfig,
    path: Option<PathBuf>,
    sink: Option<&'a mut dyn ArchiveSink>,
    name: Option<String>,
    collection: Option<&'a Collection>,
}

impl Default for ArchiveWriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ArchiveWriter<'a> {
    /// Writer using the standard configuration.
    pub fn new() -> Self {
        Self::with_config(ArchiveConfig::standard())
    }

    pub fn with_config(config: &'a ArchiveConfig) -> Self {
        Self {
            config,
            path: None,
            sink: None,
            name: None,
            collection: None,
        }
    }

    /// Write to a file. The archive extension is appended if missing.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Write into a caller-owned sink. The sink is rewound, not closed.
    pub fn sink(mut self, sink: &'a mut dyn ArchiveSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Archive base name, used for the collection member.
    ///
    /// Defaults to the file stem of the path target.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Include a collection manifest.
    pub fn collection(mut self, collection: &'a Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Write `recordings` in order.
    ///
    /// Returns the final archive path for path targets, `None` for sinks.
    pub fn write(self, recordings: &[Recording]) -> Result<Option<PathBuf>> {
        let Self {
            config,
            path,
            sink,
            name,
            collection,
        } = self;

        let target = match (path, sink) {
            (None, None) => return Err(Error::config("archive writer needs a path or a sink")),
            (Some(_), Some(_)) => return Err(Error::config("archive writer takes a path or a sink, not both")),
            (Some(path), None) => Target::Path(normalize_path(&path, config)?),
            (None, Some(sink)) => Target::Sink(sink),
        };

        let archive_name = name.or_else(|| match &target {
            Target::Path(p) => archive_stem(p, config),
            Target::Sink(_) => None,
        });

        check_inputs(config, recordings, collection, archive_name.as_deref())?;
        let members = plan_members(config, recordings, collection, archive_name.as_deref())?;

        match target {
            Target::Path(path) => {
                write_to_path(config, &path, &members)?;
                tracing::debug!(path = %path.display(), recordings = recordings.len(), "wrote archive");
                Ok(Some(path))
            }
            Target::Sink(sink) => {
                write_to_sink(config, sink, &members)?;
                tracing::debug!(recordings = recordings.len(), "wrote archive to sink");
                Ok(None)
            }
        }
    }
}

/// Append the archive extension if missing; reject any other extension.
pub fn normalize_path(path: &Path, config: &ArchiveConfig) -> Result<PathBuf> {
    let ext = config.archive_ext;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::file(format!("{} does not name a file", path.display())))?;

    if file_name.ends_with(ext) {
        return Ok(path.to_path_buf());
    }
    match extension_of(path) {
        Some(actual) => Err(Error::ExtensionMismatch {
            path: path.to_path_buf(),
            expected: ext.to_string(),
            actual,
        }),
        None => {
            let mut s = path.as_os_str().to_os_string();
            s.push(ext);
            Ok(PathBuf::from(s))
        }
    }
}

fn archive_stem(path: &Path, config: &ArchiveConfig) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    let stem = file_name.strip_suffix(config.archive_ext).unwrap_or(&file_name);
    (!stem.is_empty()).then(|| stem.to_string())
}

fn check_inputs(
    config: &ArchiveConfig,
    recordings: &[Recording],
    collection: Option<&Collection>,
    archive_name: Option<&str>,
) -> Result<()> {
    for rec in recordings {
        let name = rec.name();
        if name.is_empty() {
            return Err(Error::file("recording name must be set before archiving"));
        }
        if name.contains('/') || name == "." || name == ".." {
            return Err(Error::file(format!(
                "recording name '{name}' must be a single path component"
            )));
        }
        if !rec.has_dataset() {
            return Err(Error::file(format!(
                "recording '{}' has no dataset, bind one with set_data_file",
                rec.name()
            )));
        }
        rec.validate_with(config.validator.as_ref())?;
    }

    if let Some(collection) = collection {
        collection.validate_against_with(recordings, config.serializer.as_ref())?;
        if archive_name.is_none() {
            return Err(Error::config("collection member needs an archive name, set one with name()"));
        }
    }
    Ok(())
}

fn plan_members<'r>(
    config: &ArchiveConfig,
    recordings: &'r [Recording],
    collection: Option<&Collection>,
    archive_name: Option<&str>,
) -> Result<Vec<Member<'r>>> {
    let mut members = Vec::with_capacity(recordings.len() * 3 + 1);

    if let (Some(collection), Some(archive_name)) = (collection, archive_name) {
        members.push(Member {
            path: format!("{archive_name}{}", config.collection_ext),
            payload: Payload::Text(collection.to_text_with(config.serializer.as_ref())?),
        });
    }

    for rec in recordings {
        let name = rec.name();
        let Some(dataset) = rec.dataset() else {
            return Err(Error::file(format!("recording '{}' has no dataset", rec.name())));
        };
        members.push(Member {
            path: format!("{name}/"),
            payload: Payload::Dir,
        });
        members.push(Member {
            path: format!("{name}/{name}{}", config.dataset_ext),
            payload: Payload::Data(dataset),
        });
        members.push(Member {
            path: format!("{name}/{name}{}", config.metadata_ext),
            payload: Payload::Text(rec.to_text_with(config.serializer.as_ref())?),
        });
    }
    Ok(members)
}

fn write_to_path(config: &ArchiveConfig, path: &Path, members: &[Member<'_>]) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let cant_write = |e: io::Error| Error::file(format!("can't open {} for writing: {e}", path.display()));

    let mut tmp = tempfile::Builder::new()
        .prefix(".sigmf-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(cant_write)?;

    let mut builder = Builder::new(BufWriter::new(tmp.as_file_mut()));
    write_members(config, &mut builder, members)?;
    builder.into_inner()?.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(config.file_mode))?;
    }

    tmp.persist(path).map_err(|e| cant_write(e.error))?;
    Ok(())
}

fn write_to_sink(config: &ArchiveConfig, sink: &mut dyn ArchiveSink, members: &[Member<'_>]) -> Result<()> {
    sink.write(&[])
        .map(drop)
        .map_err(|e| Error::config(format!("sink is not byte-writable: {e}")))?;

    let end = existing_archive_end(sink)?;
    if end > 0 {
        tracing::debug!(end, "appending to existing archive");
    }
    sink.seek(SeekFrom::Start(end))?;

    let mut builder = Builder::new(&mut *sink);
    write_members(config, &mut builder, members)?;
    builder.into_inner()?;

    sink.flush()?;
    sink.seek(SeekFrom::Start(0))?;
    Ok(())
}

/// End of the last member of an archive already in `sink`, 0 if there is none.
fn existing_archive_end(sink: &mut dyn ArchiveSink) -> Result<u64> {
    sink.seek(SeekFrom::Start(0))
        .map_err(|e| Error::config(format!("sink is not seekable: {e}")))?;

    let mut archive = tar::Archive::new(&mut *sink);
    // Member bodies are seeked over, never read.
    let Ok(entries) = archive.entries_with_seek() else {
        return Ok(0);
    };
    let mut end = 0u64;
    for entry in entries {
        match entry {
            Ok(entry) => end = entry.raw_file_position() + padded_size(entry.size()),
            Err(e) => {
                tracing::debug!(error = %e, "stopped scanning existing sink content");
                break;
            }
        }
    }
    Ok(end)
}

fn write_members<W: Write>(config: &ArchiveConfig, builder: &mut Builder<W>, members: &[Member<'_>]) -> Result<()> {
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    for member in members {
        let (kind, mode, size) = match &member.payload {
            Payload::Dir => (EntryType::Directory, config.dir_mode, 0),
            Payload::Text(bytes) => (EntryType::Regular, config.file_mode, bytes.len() as u64),
            Payload::Data(dataset) => (EntryType::Regular, config.file_mode, dataset.len()),
        };
        let mut header = Header::new_ustar();
        header.set_entry_type(kind);
        header.set_mode(mode);
        header.set_size(size);
        header.set_mtime(mtime);

        match &member.payload {
            Payload::Dir => append(builder, header, &member.path, io::empty())?,
            Payload::Text(bytes) => append(builder, header, &member.path, bytes.as_slice())?,
            Payload::Data(dataset) => append(builder, header, &member.path, dataset.reader())?,
        }
        tracing::debug!(member = %member.path, size, "wrote archive member");
    }
    Ok(())
}

/// Append one member; long names go into a PAX `path` record.
fn append<W: Write>(builder: &mut Builder<W>, mut header: Header, path: &str, data: impl Read) -> Result<()> {
    if path.len() <= USTAR_NAME_LEN {
        builder.append_data(&mut header, path, data)?;
        return Ok(());
    }
    builder.append_pax_extensions([("path", path.as_bytes())])?;
    let mut cut = USTAR_NAME_LEN;
    while !path.is_char_boundary(cut) {
        cut -= 1;
    }
    header.set_path(&path[..cut])?;
    header.set_cksum();
    builder.append(&header, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DATATYPE_KEY;
    use serde_json::json;
    use std::io::Cursor;

    /// Sink that counts the bytes read through it.
    struct CountingSink {
        inner: Cursor<Vec<u8>>,
        read: u64,
    }

    impl Read for CountingSink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.read += n as u64;
            Ok(n)
        }
    }

    impl Write for CountingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for CountingSink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn u8_recording(name: &str, len: usize) -> Recording {
        let mut rec = Recording::new(name);
        rec.set_global_field(DATATYPE_KEY, json!("ru8")).unwrap();
        rec.set_dataset(Dataset::from_bytes(vec![7u8; len]), true).unwrap();
        rec
    }

    #[test]
    fn test_normalize_path() {
        let config = ArchiveConfig::standard();
        assert_eq!(normalize_path(Path::new("x"), config).unwrap(), PathBuf::from("x.sigmf"));
        assert_eq!(normalize_path(Path::new("x.sigmf"), config).unwrap(), PathBuf::from("x.sigmf"));
        assert_eq!(
            normalize_path(Path::new("some.dir/x"), config).unwrap(),
            PathBuf::from("some.dir/x.sigmf")
        );

        let err = normalize_path(Path::new("x.tar"), config).unwrap_err();
        assert!(matches!(err, Error::ExtensionMismatch { ref actual, .. } if actual == ".tar"));
        assert!(err.is_file());
    }

    #[test]
    fn test_archive_stem() {
        let config = ArchiveConfig::standard();
        assert_eq!(archive_stem(Path::new("/tmp/run.sigmf"), config).as_deref(), Some("run"));
        assert_eq!(archive_stem(Path::new(".sigmf"), config), None);
    }

    #[test]
    fn test_target_required() {
        let err = ArchiveWriter::new().write(&[]).unwrap_err();
        assert!(err.is_configuration());

        let mut sink = Cursor::new(Vec::new());
        let err = ArchiveWriter::new().path("a.sigmf").sink(&mut sink).write(&[]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_long_member_name_uses_pax() {
        let long = format!("{}/{}.sigmf-meta", "d".repeat(80), "d".repeat(80));
        let mut builder = Builder::new(Vec::new());
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(3);
        append(&mut builder, header, &long, &b"abc"[..]).unwrap();
        let bytes = builder.into_inner().unwrap();

        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entries = archive.entries().unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_string_lossy(), long);
        assert_eq!(entry.size(), 3);
    }

    #[test]
    fn test_empty_sink_has_no_archive() {
        let mut sink = Cursor::new(Vec::new());
        assert_eq!(existing_archive_end(&mut sink).unwrap(), 0);

        let mut sink = Cursor::new(vec![0x42u8; 700]);
        assert_eq!(existing_archive_end(&mut sink).unwrap(), 0);
    }

    #[test]
    fn test_existing_archive_end_skips_member_bodies() {
        let data_len = 4 << 20;
        let mut sink = Cursor::new(Vec::new());
        ArchiveWriter::new()
            .sink(&mut sink)
            .write(&[u8_recording("big", data_len)])
            .unwrap();
        let archive_len = sink.get_ref().len() as u64;

        let mut counting = CountingSink {
            inner: sink,
            read: 0,
        };
        let end = existing_archive_end(&mut counting).unwrap();
        // Two zero blocks terminate the archive.
        assert_eq!(end, archive_len - 2 * BLOCK_SIZE);
        assert!(counting.read < 64 * 1024, "scan read {} bytes", counting.read);
    }

    #[test]
    fn test_recording_name_must_be_one_component() {
        let mut sink = Cursor::new(Vec::new());
        for name in ["a/b", "a/", "..", "."] {
            let err = ArchiveWriter::new()
                .sink(&mut sink)
                .write(&[u8_recording(name, 4)])
                .unwrap_err();
            assert!(err.is_file(), "{name}: {err}");
        }
        assert!(sink.get_ref().is_empty());
    }
}
