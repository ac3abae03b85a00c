//! Input enumeration for the compress side. Walks each requested path with
//! `walkdir` (never following symlinks), classifies what it finds, and
//! normalizes archive paths to forward slashes with no `./` prefix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use walkdir::WalkDir;

use crate::error::ArchiveError;
use crate::header::{DirEntry, Entry, EntryMeta, LinkEntry};

/// Collects one [`Entry`] per file, directory, and symlink reachable from
/// `inputs`, in walk order. Duplicate archive paths are the caller's problem.
pub fn collect_entries(inputs: &[PathBuf]) -> Result<Vec<Entry>, ArchiveError> {
    let mut entries = Vec::new();

    for input in inputs {
        for item in WalkDir::new(input).follow_links(false) {
            let item = item.map_err(walk_error)?;
            let arc_path = normalize_arc_path(item.path());
            if arc_path.is_empty() {
                continue;
            }

            let md = item
                .metadata()
                .map_err(walk_error)?;
            let meta = EntryMeta {
                disk_path: item.path().to_path_buf(),
                arc_path,
                mtime: FileTime::from_last_modification_time(&md).unix_seconds(),
                atime: FileTime::from_last_access_time(&md).unix_seconds(),
            };

            let ft = item.file_type();
            if ft.is_symlink() {
                let target = fs::read_link(item.path())
                    .map_err(|e| ArchiveError::io(e, item.path()))?;
                entries.push(Entry::Link(LinkEntry {
                    meta,
                    target: target.to_string_lossy().replace('\\', "/"),
                }));
            } else if ft.is_dir() {
                entries.push(Entry::Dir(DirEntry { meta }));
            } else if ft.is_file() {
                entries.push(Entry::file(meta, md.len()));
            } else {
                tracing::debug!(path = %item.path().display(), "skipping special file");
            }
        }
    }

    Ok(entries)
}

/// Forward slashes, no `./` prefix, no leading slash. `.` itself normalizes
/// to the empty string and is dropped by the walker.
pub fn normalize_arc_path(path: &Path) -> String {
    let mut s = path.to_string_lossy().replace('\\', "/");
    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }
    let s = s.trim_start_matches('/');
    let s = s.strip_suffix('/').unwrap_or(s);
    if s == "." {
        return String::new();
    }
    s.to_string()
}

fn walk_error(err: walkdir::Error) -> ArchiveError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    ArchiveError::io(io::Error::from(err), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arc_paths_are_normalized() {
        assert_eq!(normalize_arc_path(Path::new("./a/b.txt")), "a/b.txt");
        assert_eq!(normalize_arc_path(Path::new("a/b/")), "a/b");
        assert_eq!(normalize_arc_path(Path::new("/abs/file")), "abs/file");
        assert_eq!(normalize_arc_path(Path::new(".")), "");
    }

    #[test]
    fn walk_classifies_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.txt"), b"hello").unwrap();

        let entries = collect_entries(&[root.clone()]).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0], Entry::Dir(_)));
        assert!(entries
            .iter()
            .any(|e| matches!(e, Entry::File(f) if f.size == 5)));
    }

    #[cfg(unix)]
    #[test]
    fn walk_records_symlinks_without_following() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real"), b"x").unwrap();
        let link = dir.path().join("lnk");
        std::os::unix::fs::symlink("real", &link).unwrap();

        let entries = collect_entries(&[link]).unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            Entry::Link(l) => assert_eq!(l.target, "real"),
            other => panic!("expected a link, got {other:?}"),
        }
    }
}
