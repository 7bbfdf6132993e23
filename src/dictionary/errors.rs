//! Errors for the dictionary engine.
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Which of the two files making up a dictionary.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FileKind {
    Index,
    Data,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileKind::Index => write!(f, "index"),
            FileKind::Data => write!(f, "data"),
        }
    }
}

/// Error type for opening a dictionary.
///
/// Everything that goes wrong while a dictionary is being built ends up here. Once a dictionary
/// exists, lookups can only fail with a [`DataAccessError`].
#[derive(Debug, Error)]
pub enum DictError {
    /// One of the two files is absent.
    #[error("{kind} file does not exist: {}", path.display())]
    ResourceMissing { kind: FileKind, path: PathBuf },
    /// A line of the index file can't be parsed. Line numbers start at 1.
    #[error("line {line}: {reason}")]
    MalformedIndexEntry { line: usize, reason: EntryError },
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    /// The index file couldn't be read.
    #[error("can't read index: {0}")]
    Io(#[from] io::Error),
}

/// Why an index line was rejected.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EntryError {
    #[error("not enough <tab>-separated columns found, expected at least 3")]
    MissingColumn,
    #[error("empty headword")]
    EmptyHeadword,
    #[error("too many <tab>-separated columns found, expected at most 4")]
    TooManyColumns,
    #[error("empty number")]
    EmptyNumber,
    /// Invalid character within an encoded number, with its position in the column.
    #[error("invalid character {0:?} at position {1}")]
    InvalidCharacter(char, usize),
    #[error("number doesn't fit in {0}")]
    Overflow(&'static str),
    #[error("line isn't valid {0}")]
    InvalidEncoding(&'static str),
}

/// Error type for reading definitions out of the data file.
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("range {offset}+{length} lies beyond the end of the data ({extent} bytes)")]
    OutOfBounds { offset: u64, length: u64, extent: u64 },
    /// A malformed index requested a buffer that is too large.
    #[error("a definition of {length} bytes exceeds the limit of {limit} bytes")]
    TooLarge { length: u64, limit: u64 },
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Utf8(#[from] FromUtf8Error),
    /// Errors thrown by flate2, not really descriptive.
    #[error("can't inflate dictzip chunk: {0}")]
    Deflate(#[from] flate2::DecompressError),
}

impl DictError {
    pub(crate) fn malformed(line: usize, reason: EntryError) -> DictError {
        DictError::MalformedIndexEntry { line, reason }
    }
}
