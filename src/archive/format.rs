//! Archive format constants and member naming.

use std::path::Path;

/// Extension of a SigMF archive.
pub const ARCHIVE_EXT: &str = ".sigmf";

/// Extension of a metadata file.
pub const METADATA_EXT: &str = ".sigmf-meta";

/// Extension of a dataset file.
pub const DATASET_EXT: &str = ".sigmf-data";

/// Extension of a collection manifest.
pub const COLLECTION_EXT: &str = ".sigmf-collection";

/// Permission bits of directory members (rwxr-xr-x).
pub const DIR_MODE: u32 = 0o755;

/// Permission bits of file members (rw-r--r--).
pub const FILE_MODE: u32 = 0o644;

/// Size of a tar block.
pub const BLOCK_SIZE: u64 = 512;

/// Longest member name a ustar header holds without an extended header.
pub const USTAR_NAME_LEN: usize = 100;

/// Round `size` up to a whole number of tar blocks.
#[inline]
pub const fn padded_size(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Last component of a member path.
///
/// Recordings read back from `<dir>/<stem>.sigmf-meta` are named `<stem>`;
/// the writer only accepts single-component names, so names round-trip.
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').find(|s| !s.is_empty()).unwrap_or(name)
}

/// Member name with `ext` removed, if it carries it.
pub fn strip_ext<'a>(member: &'a str, ext: &str) -> Option<&'a str> {
    member.strip_suffix(ext).filter(|s| !s.is_empty())
}

/// File name of `member` without `ext`.
pub fn member_stem<'a>(member: &'a str, ext: &str) -> Option<&'a str> {
    strip_ext(member, ext).map(base_name)
}

/// Extension of the final component of `path` including the dot, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    name.find('.').map(|i| name[i..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(0), 0);
        assert_eq!(padded_size(1), 512);
        assert_eq!(padded_size(512), 512);
        assert_eq!(padded_size(513), 1024);
    }

    #[test]
    fn test_member_names() {
        assert_eq!(base_name("a/b/c"), "c");
        assert_eq!(base_name("rec"), "rec");
        assert_eq!(member_stem("rec/rec.sigmf-meta", METADATA_EXT), Some("rec"));
        assert_eq!(member_stem("rec/rec.sigmf-data", METADATA_EXT), None);
        assert_eq!(strip_ext(".sigmf-meta", METADATA_EXT), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("dir.d/x")), None);
        assert_eq!(extension_of(Path::new("x.sigmf")).as_deref(), Some(".sigmf"));
        assert_eq!(extension_of(Path::new("x.tar.gz")).as_deref(), Some(".tar.gz"));
    }
}
