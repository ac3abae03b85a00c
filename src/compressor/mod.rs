//! # Compressor Abstraction
//!
//! A uniform block-compressor interface over four interchangeable backends:
//! plain storage, raw DEFLATE, the LZ4 frame format, and zlib-framed DEFLATE.
//!
//! Each worker slot owns one [`BlockEncoder`] for the whole run. The encoder
//! writes into an owned `Vec<u8>` sink; [`BlockEncoder::finish`] flushes the
//! final frame, hands the filled sink back, and rebinds the encoder to a
//! recycled buffer so no codec state is reallocated between blocks.
//! Decompression binds a fresh decoder per block (see [`decompress_block`]),
//! which is all the read side ever needs.

use std::fmt;
use std::io::{self, Read, Write};
use std::mem;
use std::str::FromStr;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use crate::error::ArchiveError;

/// Size of one uncompressed block fed to a worker slot.
pub const BLOCK_SIZE: usize = 1 << 20;

/// Default compression level for the DEFLATE-based codecs.
pub const DEFAULT_LEVEL: u32 = 6;

/// Identifies the codec used for every block in one archive. The value is
/// persisted as a single byte right after the magic number and is fixed for
/// the archive's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Identity copy. Useful for incompressible data and for exercising the
    /// pipeline independently of entropy coding.
    Store,
    /// Raw DEFLATE stream (no container framing).
    Deflate,
    /// LZ4 frame format.
    Lz4,
    /// zlib-framed DEFLATE. Emits nothing until the stream is finished.
    Zlib,
}

pub mod constants {
    pub const CODEC_STORE: u8 = 0x00;
    pub const CODEC_DEFLATE: u8 = 0x01;
    pub const CODEC_LZ4: u8 = 0x02;
    pub const CODEC_ZLIB: u8 = 0x03;
}

use self::constants::*;

impl Codec {
    pub const fn id(self) -> u8 {
        match self {
            Codec::Store => CODEC_STORE,
            Codec::Deflate => CODEC_DEFLATE,
            Codec::Lz4 => CODEC_LZ4,
            Codec::Zlib => CODEC_ZLIB,
        }
    }

    /// Decodes the persisted type byte. Out-of-range values are a hard
    /// format error: the byte on disk is authoritative.
    pub fn from_id(id: u8) -> Result<Self, ArchiveError> {
        match id {
            CODEC_STORE => Ok(Codec::Store),
            CODEC_DEFLATE => Ok(Codec::Deflate),
            CODEC_LZ4 => Ok(Codec::Lz4),
            CODEC_ZLIB => Ok(Codec::Zlib),
            other => Err(ArchiveError::Format(format!(
                "unknown compressor type byte {:#04x}",
                other
            ))),
        }
    }

    pub const fn available_variants() -> &'static [&'static str] {
        &["store", "deflate", "lz4", "zlib"]
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Codec::Store => "store",
            Codec::Deflate => "deflate",
            Codec::Lz4 => "lz4",
            Codec::Zlib => "zlib",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Codec {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store" => Ok(Codec::Store),
            "deflate" => Ok(Codec::Deflate),
            "lz4" => Ok(Codec::Lz4),
            "zlib" => Ok(Codec::Zlib),
            other => Err(ArchiveError::Config(format!(
                "unknown compressor type '{}', expected one of {}",
                other,
                Codec::available_variants().join(", ")
            ))),
        }
    }
}

/// One reusable per-slot block encoder bound to an owned `Vec<u8>` sink.
pub enum BlockEncoder {
    Store(Vec<u8>),
    Deflate(DeflateEncoder<Vec<u8>>),
    Lz4(Box<FrameEncoder<Vec<u8>>>),
    Zlib(ZlibEncoder<Vec<u8>>),
}

impl BlockEncoder {
    /// `level` is on the 0-9 DEFLATE scale and is ignored by `Store`/`Lz4`.
    pub fn new(codec: Codec, level: u32, sink: Vec<u8>) -> Self {
        match codec {
            Codec::Store => BlockEncoder::Store(sink),
            Codec::Deflate => {
                BlockEncoder::Deflate(DeflateEncoder::new(sink, Compression::new(level)))
            }
            Codec::Lz4 => BlockEncoder::Lz4(Box::new(FrameEncoder::new(sink))),
            Codec::Zlib => BlockEncoder::Zlib(ZlibEncoder::new(sink, Compression::new(level))),
        }
    }

    /// Feeds one block's uncompressed bytes into the encoder. Framed codecs
    /// may buffer everything until [`BlockEncoder::finish`].
    pub fn write_block(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            BlockEncoder::Store(sink) => {
                sink.extend_from_slice(data);
                Ok(())
            }
            BlockEncoder::Deflate(enc) => enc.write_all(data),
            BlockEncoder::Lz4(enc) => enc.write_all(data),
            BlockEncoder::Zlib(enc) => enc.write_all(data),
        }
    }

    /// Flushes the final encoded frame, returns the filled sink, and rebinds
    /// the encoder to `replacement` for the next block. The same physical
    /// encoder instance is reused across every block of the run.
    pub fn finish(&mut self, replacement: Vec<u8>) -> io::Result<Vec<u8>> {
        match self {
            BlockEncoder::Store(sink) => Ok(mem::replace(sink, replacement)),
            BlockEncoder::Deflate(enc) => enc.reset(replacement),
            BlockEncoder::Zlib(enc) => enc.reset(replacement),
            BlockEncoder::Lz4(enc) => {
                // The LZ4 frame encoder is consumed by `finish`, so swap a
                // new one (around the recycled buffer) into its place.
                let done = mem::replace(enc, Box::new(FrameEncoder::new(replacement)));
                done.finish()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
        }
    }
}

/// Decompresses one stored block through a freshly bound decoder, appending
/// the decoded bytes to `dst`. Malformed input surfaces as
/// [`ArchiveError::Codec`].
pub fn decompress_block(codec: Codec, src: &[u8], dst: &mut Vec<u8>) -> Result<(), ArchiveError> {
    let result = match codec {
        Codec::Store => {
            dst.extend_from_slice(src);
            Ok(src.len() as u64)
        }
        Codec::Deflate => io::copy(&mut DeflateDecoder::new(src), dst),
        Codec::Lz4 => io::copy(&mut FrameDecoder::new(src), dst),
        Codec::Zlib => io::copy(&mut ZlibDecoder::new(src), dst),
    };
    result.map(drop).map_err(ArchiveError::Codec)
}
