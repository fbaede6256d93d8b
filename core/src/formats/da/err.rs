use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Failures while turning a raw byte stream into records.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum RecordError {
    #[error("Corrupt record stream: {what} of {len} does not fit {geometry}")]
    #[diagnostic(
        code(tu_post::da::corrupt_record),
        help("Check the record length and slice count declared in the .pli file")
    )]
    CorruptRecord {
        what: &'static str,
        len: usize,
        geometry: String,
    },
    #[error("Unsupported float width of {0} bytes")]
    #[diagnostic(code(tu_post::da::unsupported_width), help("IBYTE must be 4 or 8"))]
    UnsupportedWidth(usize),
    #[error("Records hold {found} values, at least 3 are needed for a timestamp")]
    #[diagnostic(code(tu_post::da::short_record))]
    ShortRecord { found: usize },
}

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("File {} does not exist", .path.display())]
    #[diagnostic(code(tu_post::da::missing_file))]
    MissingFile { path: PathBuf },
    #[error("File {} is empty", .path.display())]
    #[diagnostic(code(tu_post::da::empty_file))]
    EmptyFile { path: PathBuf },
    #[error("Failed to read {}", .path.display())]
    #[diagnostic(code(tu_post::da::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to decode {}", .path.display())]
    #[diagnostic(code(tu_post::da::decode))]
    Decode {
        path: PathBuf,
        #[source]
        #[diagnostic_source]
        source: RecordError,
    },
}

impl Error {
    /// The decoding failure behind this error, if any.
    pub fn record_error(&self) -> Option<&RecordError> {
        match self {
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}
