//! # Block Pipeline
//!
//! Fixed-width parallel engine shared by compression and restore. A
//! [`SlotPool`] holds one slot per logical CPU; each round fills the slots'
//! plain buffers with up to [`BLOCK_SIZE`] bytes in slot order, fans the
//! filled slots out across scoped worker threads, joins them, and emits the
//! results in slot order. Buffers and encoders live for the whole run.
//!
//! On the compress side emitted blocks accumulate in a caller-owned buffer;
//! once it passes [`FLUSH_HIGH_WATER`] the buffer is handed through a
//! [`FlushGate`] to a dedicated writer thread, so the next round's
//! compression overlaps the disk write. The gate's channel has capacity
//! zero, which keeps at most one buffer in flight.
//!
//! A file's stream checksum is the XOR of the independent per-block CRC32
//! values. XOR commutes, so the combined value is independent of the order
//! workers finish in.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::mem;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::compressor::{decompress_block, BlockEncoder, Codec, BLOCK_SIZE};
use crate::error::ArchiveError;

/// Accumulation-buffer size that triggers a background flush.
pub const FLUSH_HIGH_WATER: usize = 8 * BLOCK_SIZE;

/// Length-prefix value that terminates a file's block stream.
const END_OF_STREAM: i64 = -1;

/// Upper bound on a stored block's length prefix. Incompressible input can
/// expand a little past BLOCK_SIZE; anything past twice that is corruption.
const MAX_BLOCK_LEN: i64 = 2 * BLOCK_SIZE as i64;

/// One worker slot: a plain-side buffer, a stored-side buffer, and the
/// slot's reusable encoder.
struct Slot {
    plain: Vec<u8>,
    packed: Vec<u8>,
    spare: Vec<u8>,
    encoder: BlockEncoder,
}

impl Slot {
    fn new(codec: Codec, level: u32) -> Self {
        Slot {
            plain: Vec::with_capacity(BLOCK_SIZE),
            packed: Vec::new(),
            spare: Vec::new(),
            encoder: BlockEncoder::new(codec, level, Vec::with_capacity(BLOCK_SIZE)),
        }
    }

    /// Drains `plain` through the slot's encoder into a finished frame in
    /// `packed`. Runs on a worker thread.
    fn compress_block(&mut self) -> io::Result<()> {
        self.encoder.write_block(&self.plain)?;
        self.plain.clear();
        let sink = mem::take(&mut self.spare);
        self.packed = self.encoder.finish(sink)?;
        Ok(())
    }

    /// Returns the emitted `packed` buffer to the encoder's spare position.
    fn recycle(&mut self) {
        self.spare = mem::take(&mut self.packed);
        self.spare.clear();
    }
}

/// N worker slots, N = logical CPUs. One pool per operation, threaded by
/// `&mut` through every file in the run so buffers and codec state are
/// reused instead of rebuilt.
pub struct SlotPool {
    slots: Vec<Slot>,
    codec: Codec,
}

impl SlotPool {
    pub fn new(codec: Codec, level: u32) -> Self {
        Self::with_slots(num_cpus::get().max(1), codec, level)
    }

    /// Pool with an explicit slot count. The on-disk stream does not encode
    /// the width, so any count reads any archive.
    pub fn with_slots(slots: usize, codec: Codec, level: u32) -> Self {
        SlotPool {
            slots: (0..slots.max(1)).map(|_| Slot::new(codec, level)).collect(),
            codec,
        }
    }
}

/// Compress side of the single-flight background flush. `flush` hands a full
/// accumulation buffer to the writer thread and returns a recycled buffer to
/// keep filling.
pub struct FlushGate {
    buffers: Sender<Vec<u8>>,
    recycled: Receiver<Vec<u8>>,
}

impl FlushGate {
    pub fn new(buffers: Sender<Vec<u8>>, recycled: Receiver<Vec<u8>>) -> Self {
        FlushGate { buffers, recycled }
    }

    /// Blocks until the writer thread accepts the buffer. A closed channel
    /// means the writer already failed; its own error supersedes this one.
    pub fn flush(&self, buf: Vec<u8>) -> Result<Vec<u8>, ArchiveError> {
        if buf.is_empty() {
            return Ok(buf);
        }
        tracing::debug!(len = buf.len(), "flushing write buffer");
        self.buffers
            .send(buf)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive writer stopped"))?;
        Ok(self.recycled.try_recv().unwrap_or_default())
    }
}

/// Streams one file through the pool: fill, fan-out compress, emit length
/// prefix + block per filled slot, flush past the high-water mark. Ends the
/// stream with the `-1` sentinel and the accumulated CRC, and returns that
/// CRC.
pub fn compress_file<R: Read>(
    pool: &mut SlotPool,
    input: &mut R,
    gate: &FlushGate,
    acc: &mut Vec<u8>,
) -> Result<u32, ArchiveError> {
    let mut crc = 0u32;

    loop {
        let filled = load_plain(pool, input)?;
        if filled == 0 {
            break;
        }

        compress_round(&mut pool.slots[..filled])?;

        for slot in &mut pool.slots[..filled] {
            acc.extend_from_slice(&(slot.packed.len() as i64).to_le_bytes());
            crc ^= crc32fast::hash(&slot.packed);
            acc.extend_from_slice(&slot.packed);
            tracing::debug!(len = slot.packed.len(), "block queued");
            slot.recycle();

            if acc.len() >= FLUSH_HIGH_WATER {
                *acc = gate.flush(mem::take(acc))?;
            }
        }
    }

    acc.extend_from_slice(&END_OF_STREAM.to_le_bytes());
    acc.extend_from_slice(&crc.to_le_bytes());
    tracing::debug!(crc = format_args!("{crc:08X}"), "stream finished");

    Ok(crc)
}

/// Restores one file's stream: read length prefixes in slot order (`-1`
/// anywhere ends the stream), XOR each stored block's CRC32, fan-out
/// decompress, append plain bytes in slot order. Returns `true` when the
/// recomputed checksum disagrees with the stored one.
///
/// A zero-byte file has no rounds; the first prefix is already the sentinel.
pub fn decompress_file<R: Read, W: Write>(
    pool: &mut SlotPool,
    input: &mut R,
    out: &mut W,
) -> Result<bool, ArchiveError> {
    let mut crc = 0u32;

    loop {
        let (filled, eof) = load_packed(pool, input, &mut crc)?;

        decompress_round(&mut pool.slots[..filled], pool.codec)?;

        for slot in &mut pool.slots[..filled] {
            out.write_all(&slot.plain)?;
            slot.plain.clear();
            slot.packed.clear();
        }

        if eof {
            break;
        }
    }

    let stored = read_u32(input)?;
    tracing::debug!(
        computed = format_args!("{crc:08X}"),
        stored = format_args!("{stored:08X}"),
        "stream checksum"
    );
    Ok(crc != stored)
}

/// Seeks past one file's block stream (prefixes, blocks, sentinel, CRC)
/// without reading the data. Used when a restore skips an entry.
pub fn skip_stream<R: Read + Seek>(r: &mut R) -> Result<u64, ArchiveError> {
    let mut compressed = 0u64;
    loop {
        let len = read_i64(r)?;
        if len == END_OF_STREAM {
            break;
        }
        check_block_len(len)?;
        r.seek(SeekFrom::Current(len))?;
        compressed += len as u64;
    }
    r.seek(SeekFrom::Current(4))?;
    Ok(compressed)
}

/// Result of a [`verify_stream`] framing walk.
pub struct StreamSummary {
    /// Sum of the block length prefixes.
    pub compressed: u64,
    /// The CRC32 recorded at the end of the stream.
    pub stored_crc: u32,
    /// Whether the recomputed XOR of block CRCs disagrees with `stored_crc`.
    pub damaged: bool,
}

/// Walks one stream recomputing its checksum without decompressing anything.
/// Backs both the integrity pre-check and the stat scanner.
pub fn verify_stream<R: Read>(r: &mut R) -> Result<StreamSummary, ArchiveError> {
    let mut compressed = 0u64;
    let mut crc = 0u32;
    let mut block = Vec::new();

    loop {
        let len = read_i64(r)?;
        if len == END_OF_STREAM {
            break;
        }
        check_block_len(len)?;
        block.resize(len as usize, 0);
        r.read_exact(&mut block).map_err(truncated)?;
        crc ^= crc32fast::hash(&block);
        compressed += len as u64;
    }

    let stored_crc = read_u32(r)?;
    Ok(StreamSummary {
        compressed,
        stored_crc,
        damaged: crc != stored_crc,
    })
}

/// Fills slot plain buffers in order with up to BLOCK_SIZE bytes each,
/// stopping early at EOF. Returns the number of slots holding data.
fn load_plain<R: Read>(pool: &mut SlotPool, input: &mut R) -> Result<usize, ArchiveError> {
    let mut filled = 0;
    for slot in &mut pool.slots {
        slot.plain.clear();
        let n = (&mut *input)
            .take(BLOCK_SIZE as u64)
            .read_to_end(&mut slot.plain)?;
        if n == 0 {
            break;
        }
        filled += 1;
        if n < BLOCK_SIZE {
            break;
        }
    }
    Ok(filled)
}

/// Reads up to N stored blocks in slot order, folding each block's CRC into
/// `crc`. A `-1` prefix at any slot position ends the stream; the slots
/// already loaded this round are still handed to the workers.
fn load_packed<R: Read>(
    pool: &mut SlotPool,
    input: &mut R,
    crc: &mut u32,
) -> Result<(usize, bool), ArchiveError> {
    let mut filled = 0;
    for slot in &mut pool.slots {
        let len = read_i64(input)?;
        if len == END_OF_STREAM {
            return Ok((filled, true));
        }
        check_block_len(len)?;
        slot.packed.resize(len as usize, 0);
        input.read_exact(&mut slot.packed).map_err(truncated)?;
        *crc ^= crc32fast::hash(&slot.packed);
        filled += 1;
    }
    Ok((filled, false))
}

/// Fan-out: one scoped worker per filled slot runs its encoder; fan-in joins
/// all workers before the round's blocks are emitted.
fn compress_round(slots: &mut [Slot]) -> Result<(), ArchiveError> {
    let (err_tx, err_rx) = bounded(slots.len());

    thread::scope(|s| {
        for slot in slots.iter_mut() {
            let err_tx = err_tx.clone();
            s.spawn(move || {
                if let Err(e) = slot.compress_block() {
                    let _ = err_tx.send(e);
                }
            });
        }
    });
    drop(err_tx);

    match err_rx.try_recv() {
        Ok(e) => Err(ArchiveError::Codec(e)),
        Err(_) => Ok(()),
    }
}

/// Mirror of [`compress_round`]: each worker binds a fresh decoder to its
/// slot's stored block.
fn decompress_round(slots: &mut [Slot], codec: Codec) -> Result<(), ArchiveError> {
    let (err_tx, err_rx) = bounded(slots.len());

    thread::scope(|s| {
        for slot in slots.iter_mut() {
            let err_tx = err_tx.clone();
            s.spawn(move || {
                slot.plain.clear();
                if let Err(e) = decompress_block(codec, &slot.packed, &mut slot.plain) {
                    let _ = err_tx.send(e);
                }
            });
        }
    });
    drop(err_tx);

    match err_rx.try_recv() {
        Ok(e) => Err(e),
        Err(_) => Ok(()),
    }
}

fn check_block_len(len: i64) -> Result<(), ArchiveError> {
    if len <= 0 || len > MAX_BLOCK_LEN {
        return Err(ArchiveError::Format(format!(
            "stored block length {} out of range",
            len
        )));
    }
    Ok(())
}

fn read_i64<R: Read>(r: &mut R) -> Result<i64, ArchiveError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, ArchiveError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn truncated(err: io::Error) -> ArchiveError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ArchiveError::Format("archive ends in the middle of a block stream".into())
    } else {
        ArchiveError::from(err)
    }
}
