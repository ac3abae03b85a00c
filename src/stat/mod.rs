//! Archive inventory without decompression. `list` reads headers only;
//! `scan` additionally walks the data section's framing to recover each
//! file's compressed size and stored checksum, since neither lives in the
//! header.

use chrono::DateTime;

use crate::archive::Archive;
use crate::compressor::Codec;
use crate::error::ArchiveError;
use crate::header::{human_size, sort_by_arc_path, Entry};
use crate::pipeline::verify_stream;

/// Entries sorted for display (case-insensitive by archive path).
pub fn list(archive: &Archive) -> Result<Vec<Entry>, ArchiveError> {
    let (mut entries, _) = archive.read_entries()?;
    sort_by_arc_path(&mut entries);
    Ok(entries)
}

/// Full inventory with per-file compressed sizes, checksums, and totals.
pub struct ArchiveStat {
    pub codec: Codec,
    pub entries: Vec<Entry>,
    pub uncompressed: u64,
    pub compressed: u64,
}

pub fn scan(archive: &Archive) -> Result<ArchiveStat, ArchiveError> {
    let (mut entries, mut reader) = archive.read_entries()?;

    // Streams sit in header order; the display sort happens afterwards.
    let mut uncompressed = 0u64;
    let mut compressed = 0u64;
    for entry in entries.iter_mut() {
        if let Entry::File(fi) = entry {
            let summary = verify_stream(&mut reader)?;
            fi.compressed = summary.compressed;
            fi.crc32 = summary.stored_crc;
            fi.damaged = summary.damaged;
            uncompressed += fi.size;
            compressed += fi.compressed;
        }
    }
    sort_by_arc_path(&mut entries);

    Ok(ArchiveStat {
        codec: archive.codec,
        entries,
        uncompressed,
        compressed,
    })
}

impl ArchiveStat {
    /// Plain-text table, one row per entry, totals at the bottom.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("compressor: {}\n", self.codec));
        out.push_str(&format!(
            "{:<40} {:>9} {:>9} {:>7} {:>19} {:>10}\n",
            "name", "size", "packed", "ratio", "modified", "crc32"
        ));

        for entry in &self.entries {
            match entry {
                Entry::File(fi) => {
                    let flag = if fi.damaged { " (damaged)" } else { "" };
                    out.push_str(&format!(
                        "{:<40} {:>9} {:>9} {:>6.1}% {:>19} {:>10}{}\n",
                        fi.meta.arc_path,
                        human_size(fi.size),
                        human_size(fi.compressed),
                        ratio(fi.compressed, fi.size),
                        format_time(fi.meta.mtime),
                        format!("{:08X}", fi.crc32),
                        flag,
                    ));
                }
                Entry::Link(l) => {
                    out.push_str(&format!("{} -> {}\n", l.meta.arc_path, l.target));
                }
                Entry::Dir(d) => {
                    out.push_str(&format!("{}/\n", d.meta.arc_path));
                }
            }
        }

        out.push_str(&format!(
            "total: {} -> {} ({:.1}%)\n",
            human_size(self.uncompressed),
            human_size(self.compressed),
            ratio(self.compressed, self.uncompressed),
        ));
        out
    }
}

fn ratio(compressed: u64, uncompressed: u64) -> f64 {
    if uncompressed == 0 {
        return 0.0;
    }
    compressed as f64 / uncompressed as f64 * 100.0
}

fn format_time(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}
