use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::formats::pli;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("File {} does not exist", .path.display())]
    #[diagnostic(code(tu_post::inp::missing_file))]
    MissingFile { path: PathBuf },
    #[error("Failed to access {}", .path.display())]
    #[diagnostic(code(tu_post::inp::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Expected {expected} on line {line}, found {found:?}")]
    #[diagnostic(code(tu_post::inp::schema_mismatch))]
    SchemaMismatch {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("Expected a number on line {line}, found {found:?}")]
    #[diagnostic(code(tu_post::inp::invalid_number))]
    InvalidNumber { line: usize, found: String },
    #[error("Unknown plot type {found} on line {line}")]
    #[diagnostic(
        code(tu_post::inp::unknown_plot_type),
        help("The plot type (IDGA) must be 1, 2 or 3")
    )]
    UnknownPlotType { line: usize, found: u8 },
    #[error("{} mixes time-resolved and statistical diagrams", .path.display())]
    #[diagnostic(
        code(tu_post::inp::mixed_kind),
        help("TuPlot and TuStat diagrams have to go into separate files")
    )]
    MixedKind { path: PathBuf },
    #[error("{} holds no diagrams", .path.display())]
    #[diagnostic(code(tu_post::inp::no_diagrams))]
    NoDiagrams { path: PathBuf },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] pli::Error),
}
