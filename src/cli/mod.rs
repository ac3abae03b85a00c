//! Command-line surface: clap derive definitions plus the stdin overwrite
//! prompt the restore path uses when an output file already exists.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::compressor::Codec;
use crate::extract::{OverwriteChoice, OverwritePrompt};

#[derive(Parser, Debug)]
#[command(name = "parz", author, version, about = "Block-parallel file archiver", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create a new archive from the given files and directories.
    #[command(alias = "c")]
    Create {
        /// The path for the output archive file (e.g. backup.parz).
        #[arg(short, long)]
        output: PathBuf,

        /// One or more input files or directories to pack.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Compressor for every block in the archive: store, deflate, lz4 or zlib.
        #[arg(short, long, default_value = "deflate")]
        codec: Codec,

        /// Compression level (0-9). Meaningful for deflate and zlib only.
        #[arg(short, long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },

    /// Restore an archive's contents.
    #[command(alias = "x")]
    Extract {
        /// The archive file to restore.
        archive: PathBuf,

        /// The directory to restore into. Defaults to the current directory.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Verify each file's checksum before writing; damaged files are skipped.
        #[arg(long)]
        integrity: bool,

        /// Overwrite existing files without asking.
        #[arg(short = 'y', long)]
        replace_all: bool,
    },

    /// List archive contents.
    #[command(alias = "l")]
    List {
        /// The archive file to list.
        archive: PathBuf,
    },

    /// Show per-file sizes, compression ratios and checksums.
    #[command(alias = "s")]
    Stat {
        /// The archive file to inspect.
        archive: PathBuf,
    },
}

pub fn run() -> Result<Commands, clap::Error> {
    let args = Args::try_parse()?;
    Ok(args.command)
}

/// Asks on stdin, once per conflicting file, until the answer parses.
pub struct StdinPrompt;

impl OverwritePrompt for StdinPrompt {
    fn ask(&mut self, path: &Path) -> OverwriteChoice {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!(
                "'{}' already exists, replace? [(y)es/(n)o/(a)ll]: ",
                path.display()
            );
            let _ = io::stdout().flush();

            line.clear();
            if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
                return OverwriteChoice::Skip;
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return OverwriteChoice::Replace,
                "a" | "all" => return OverwriteChoice::ReplaceAll,
                "n" | "no" => return OverwriteChoice::Skip,
                _ => continue,
            }
        }
    }
}
