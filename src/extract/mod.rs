//! Restore orchestration. Directories and symlinks come back first (with
//! their timestamps), then each file entry streams through the block
//! pipeline in header order. Existing files go through the caller-supplied
//! overwrite prompt; a checksum mismatch marks the entry damaged and moves
//! on, it never aborts the restore.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::archive::Archive;
use crate::error::{ArchiveError, Stage, StageExt};
use crate::fsx;
use crate::header::{Entry, FileEntry};
use crate::pipeline::{decompress_file, skip_stream, verify_stream, SlotPool};

/// Answer to "this file already exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteChoice {
    Replace,
    ReplaceAll,
    Skip,
}

/// Collaborator deciding what to do with an existing output file. The CLI
/// asks on stdin; tests supply canned answers.
pub trait OverwritePrompt {
    fn ask(&mut self, path: &Path) -> OverwriteChoice;
}

/// Replaces everything without asking.
pub struct ReplaceAll;

impl OverwritePrompt for ReplaceAll {
    fn ask(&mut self, _path: &Path) -> OverwriteChoice {
        OverwriteChoice::ReplaceAll
    }
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub output_dir: PathBuf,
    /// Verify each file's stream checksum before writing anything; damaged
    /// entries are skipped instead of restored partially.
    pub integrity: bool,
    /// Start in replace-all mode, never prompting.
    pub replace_all: bool,
}

impl RestoreOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        RestoreOptions {
            output_dir: output_dir.into(),
            integrity: false,
            replace_all: false,
        }
    }
}

/// What a restore did, per archive path.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub skipped: Vec<String>,
    pub damaged: Vec<String>,
}

/// Restores the whole archive under `opts.output_dir`.
pub fn restore(
    archive: &Archive,
    opts: &RestoreOptions,
    prompt: &mut dyn OverwritePrompt,
) -> Result<RestoreReport, ArchiveError> {
    let (entries, mut reader) = archive.read_entries().stage(Stage::Decompress)?;

    let mut report = RestoreReport::default();

    // Directories and symlinks carry no data section and come back first,
    // so every file has a home to land in.
    for entry in &entries {
        match entry {
            Entry::Dir(d) => {
                let out = opts.output_dir.join(&d.meta.arc_path);
                fs::create_dir_all(&out)
                    .map_err(|e| ArchiveError::io(e, &out))
                    .stage(Stage::Decompress)?;
                restore_times(&out, d.meta.mtime, d.meta.atime, false);
                report.restored.push(d.meta.arc_path.clone());
            }
            Entry::Link(l) => {
                let out = opts.output_dir.join(&l.meta.arc_path);
                make_parent(&out).stage(Stage::Decompress)?;
                match fsx::symlink(Path::new(&l.target), &out) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(ArchiveError::io(e, &out).into_stage(Stage::Decompress)),
                }
                restore_times(&out, l.meta.mtime, l.meta.atime, true);
                report.restored.push(l.meta.arc_path.clone());
            }
            Entry::File(_) => {}
        }
    }

    let mut pool = SlotPool::new(archive.codec, archive.level);
    let mut replace_all = opts.replace_all;

    for entry in &entries {
        let Entry::File(fi) = entry else { continue };
        let out = opts.output_dir.join(&fi.meta.arc_path);
        make_parent(&out).stage(Stage::Decompress)?;

        if out.exists() && !replace_all {
            match prompt.ask(&out) {
                OverwriteChoice::Skip => {
                    skip_stream(&mut reader).stage(Stage::Decompress)?;
                    report.skipped.push(fi.meta.arc_path.clone());
                    continue;
                }
                OverwriteChoice::ReplaceAll => replace_all = true,
                OverwriteChoice::Replace => {}
            }
        }

        if opts.integrity {
            let data_pos = reader.stream_position().stage(Stage::Integrity)?;
            let summary = verify_stream(&mut reader).stage(Stage::Integrity)?;
            if summary.damaged {
                tracing::warn!(path = %fi.meta.arc_path, "checksum mismatch, skipping");
                report.damaged.push(fi.meta.arc_path.clone());
                continue;
            }
            reader
                .seek(SeekFrom::Start(data_pos))
                .stage(Stage::Integrity)?;
        }

        let damaged = write_file(&mut pool, &mut reader, fi, &out).stage(Stage::Decompress)?;
        restore_times(&out, fi.meta.mtime, fi.meta.atime, false);

        if damaged {
            tracing::warn!(path = %fi.meta.arc_path, "checksum mismatch");
            report.damaged.push(fi.meta.arc_path.clone());
        } else {
            report.restored.push(fi.meta.arc_path.clone());
        }
    }

    Ok(report)
}

fn write_file<R: std::io::Read>(
    pool: &mut SlotPool,
    reader: &mut R,
    fi: &FileEntry,
    out: &Path,
) -> Result<bool, ArchiveError> {
    let file = File::create(out).map_err(|e| ArchiveError::io(e, out))?;
    let mut writer = BufWriter::new(file);
    let damaged = decompress_file(pool, reader, &mut writer)?;
    writer.flush().map_err(|e| ArchiveError::io(e, out))?;
    tracing::debug!(path = %fi.meta.arc_path, size = fi.size, damaged, "restored");
    Ok(damaged)
}

fn make_parent(path: &Path) -> Result<(), ArchiveError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(e, parent))?;
        }
    }
    Ok(())
}

/// Timestamp restoration is best effort; a filesystem that refuses it does
/// not fail the restore.
fn restore_times(path: &Path, mtime: i64, atime: i64, is_symlink: bool) {
    let result = if is_symlink {
        fsx::restore_symlink_times(path, atime, mtime)
    } else {
        fsx::restore_times(path, atime, mtime)
    };
    if let Err(e) = result {
        tracing::debug!(path = %path.display(), error = %e, "timestamps not restored");
    }
}
