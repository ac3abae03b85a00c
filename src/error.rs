use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The phase an error was raised in, so a caller (or an exit-code mapper)
/// can tell which part of the run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compress,
    Decompress,
    Integrity,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Compress => "compress",
            Stage::Decompress => "decompress",
            Stage::Integrity => "integrity",
        };
        write!(f, "{}", s)
    }
}

/// The primary error type for all operations in the `parz` crate.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O error occurred, typically while reading or writing a file.
    /// Includes the path where the error happened when known.
    #[error("I/O error on path '{path}': {source}", path = .path.display())]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// The container bytes do not form a valid archive: bad magic, bad
    /// compressor-type byte, out-of-range path length, or an unknown tag.
    /// Always fatal; header decoding cannot re-sync past a corrupt record.
    #[error("archive format error: {0}")]
    Format(String),

    /// A codec backend rejected its input as malformed compressed data.
    #[error("corrupt data: {0}")]
    Codec(#[source] io::Error),

    /// Invalid session configuration, raised before any I/O happens.
    #[error("config error: {0}")]
    Config(String),

    /// Nothing left to archive after input deduplication.
    #[error("no entries to archive")]
    NoEntries,

    /// Any error wrapped with the phase it was raised in. The original
    /// cause is kept as the source.
    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<ArchiveError>,
    },
}

impl ArchiveError {
    /// An I/O error annotated with the path it happened on.
    pub fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        ArchiveError::Io {
            source,
            path: path.into(),
        }
    }

    /// The stage this error was raised in, if it carries one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ArchiveError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Wrap the error with a stage tag. Already-tagged errors keep their
    /// original (innermost) stage.
    pub fn into_stage(self, stage: Stage) -> Self {
        match self {
            tagged @ ArchiveError::Stage { .. } => tagged,
            other => ArchiveError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}

// Generic I/O error conversion that doesn't carry a path.
impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        ArchiveError::Io {
            source: err,
            path: PathBuf::new(),
        }
    }
}

/// Shorthand for tagging a whole `Result` with a stage.
pub(crate) trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, ArchiveError>;
}

impl<T, E: Into<ArchiveError>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: Stage) -> Result<T, ArchiveError> {
        self.map_err(|e| e.into().into_stage(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wrapping_keeps_cause_and_innermost_stage() {
        let err = ArchiveError::Format("bad magic".into())
            .into_stage(Stage::Decompress)
            .into_stage(Stage::Integrity);
        assert_eq!(err.stage(), Some(Stage::Decompress));
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn untagged_errors_have_no_stage() {
        assert_eq!(ArchiveError::NoEntries.stage(), None);
    }
}
