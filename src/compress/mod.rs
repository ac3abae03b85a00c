//! Compress orchestration: enumerate inputs, write the prelude and every
//! entry header, then stream each file through the block pipeline. A
//! dedicated writer thread owns the archive `BufWriter` for the data
//! section, fed accumulation buffers through the pipeline's [`FlushGate`].
//!
//! Any failure removes the partially written archive before the error is
//! returned, tagged with the compress stage.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::mem;
use std::path::PathBuf;
use std::thread;

use crossbeam_channel::bounded;

use crate::archive::{write_prelude, Archive};
use crate::error::{ArchiveError, Stage, StageExt};
use crate::header::{drop_duplicates, Entry};
use crate::pipeline::{compress_file, FlushGate, SlotPool};
use crate::walk;

/// Packs `inputs` into a new archive at the session's path.
pub fn create(archive: &Archive, inputs: &[PathBuf]) -> Result<(), ArchiveError> {
    let entries = walk::collect_entries(inputs).stage(Stage::Compress)?;
    let entries = drop_duplicates(entries);
    if entries.is_empty() {
        return Err(ArchiveError::NoEntries.into_stage(Stage::Compress));
    }

    write_archive(archive, &entries).map_err(|e| {
        archive.remove_partial();
        e.into_stage(Stage::Compress)
    })
}

fn write_archive(archive: &Archive, entries: &[Entry]) -> Result<(), ArchiveError> {
    let file = File::create(&archive.path).map_err(|e| ArchiveError::io(e, &archive.path))?;
    let mut out = BufWriter::new(file);

    write_prelude(&mut out, archive.codec, entries.len() as u32)?;
    for entry in entries {
        entry.encode(&mut out)?;
    }

    let mut pool = SlotPool::new(archive.codec, archive.level);

    thread::scope(|s| {
        let (buf_tx, buf_rx) = bounded::<Vec<u8>>(0);
        let (rec_tx, rec_rx) = bounded::<Vec<u8>>(2);

        let writer = s.spawn(move || -> io::Result<()> {
            for mut buf in buf_rx {
                out.write_all(&buf)?;
                buf.clear();
                // Full recycle channel just means the compressor is ahead;
                // dropping the buffer is fine.
                let _ = rec_tx.try_send(buf);
            }
            out.flush()
        });

        let gate = FlushGate::new(buf_tx, rec_rx);
        let mut acc = Vec::new();
        let mut pump = || -> Result<(), ArchiveError> {
            for entry in entries {
                let Entry::File(fi) = entry else { continue };
                let input = File::open(&fi.meta.disk_path)
                    .map_err(|e| ArchiveError::io(e, &fi.meta.disk_path))?;
                let crc = compress_file(&mut pool, &mut BufReader::new(input), &gate, &mut acc)?;
                tracing::info!(
                    path = %fi.meta.arc_path,
                    size = fi.size,
                    crc = format_args!("{crc:08X}"),
                    "packed"
                );
            }
            gate.flush(mem::take(&mut acc))?;
            Ok(())
        };
        let pumped = pump();
        drop(gate);

        // The writer's own I/O error outranks the broken-pipe signal the
        // pipeline sees when the writer stops early.
        match writer.join() {
            Ok(Ok(())) => pumped,
            Ok(Err(e)) => Err(ArchiveError::io(e, &archive.path)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    })
}
