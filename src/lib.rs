//! # parz Core Library
//!
//! Block-parallel archiver with a compact binary container format. Files,
//! directories, and symlinks go into a single compressed archive and come
//! back losslessly, with per-file CRC32 damage detection.
//!
//! The engine splits every file into fixed 1 MiB blocks, compresses one
//! block per logical CPU in scoped worker threads, and overlaps disk writes
//! with the next round's compression. The codec (store, deflate, lz4 or
//! zlib) is chosen at creation time and fixed for the archive's lifetime.
//!
//! ## Key modules
//!
//! - [`archive`]: archive session, magic/codec validation, header reading.
//! - [`compress`]: the create operation.
//! - [`extract`]: the restore operation, overwrite prompts, damage reporting.
//! - [`stat`]: listing and per-file statistics without decompression.
//! - [`pipeline`]: the block-parallel compress/decompress engine.
//! - [`compressor`]: the pluggable codec layer.
//! - [`header`]: the binary entry header protocol.
//!
//! ```no_run
//! use parz::{Archive, compress, extract};
//! use parz::compressor::Codec;
//!
//! # fn main() -> Result<(), parz::ArchiveError> {
//! let archive = Archive::create("backup.parz", Codec::Deflate, 6)?;
//! compress::create(&archive, &["photos".into()])?;
//!
//! let archive = Archive::open("backup.parz")?;
//! let opts = extract::RestoreOptions::new("restored");
//! let report = extract::restore(&archive, &opts, &mut extract::ReplaceAll)?;
//! assert!(report.damaged.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cli;
pub mod compress;
pub mod compressor;
pub mod error;
pub mod extract;
pub mod fsx;
pub mod header;
pub mod pipeline;
pub mod stat;
pub mod walk;

pub use archive::Archive;
pub use error::ArchiveError;
