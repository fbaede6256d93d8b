use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("File {} does not exist", .path.display())]
    #[diagnostic(code(tu_post::plot::missing_file))]
    MissingFile { path: PathBuf },
    #[error("Failed to access {}", .path.display())]
    #[diagnostic(code(tu_post::plot::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Metadata declares data file {declared:?} but {actual:?} was given")]
    #[diagnostic(
        code(tu_post::plot::data_file_mismatch),
        help("Pass the .dat file written together with this .plt file")
    )]
    DataFileMismatch { declared: String, actual: String },
    #[error("Expected {expected} values on line {line}, found {found}")]
    #[diagnostic(code(tu_post::plot::schema_mismatch))]
    SchemaMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Invalid number {found:?} on line {line}")]
    #[diagnostic(code(tu_post::plot::invalid_number))]
    InvalidNumber { line: usize, found: String },
    #[error("Curve data up to line {line} is not closed by an end-of-curve marker")]
    #[diagnostic(code(tu_post::plot::unterminated_curve), help("Every curve must end with `//nc`"))]
    UnterminatedCurve { line: usize },
    #[error("Failed to write {}", .path.display())]
    #[diagnostic(code(tu_post::plot::csv))]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
