use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("File {} does not exist", .path.display())]
    #[diagnostic(code(tu_post::pli::missing_file))]
    MissingFile { path: PathBuf },
    #[error("Failed to read {}", .path.display())]
    #[diagnostic(code(tu_post::pli::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Option header on line {line} names {names} options but {values} values follow")]
    #[diagnostic(
        code(tu_post::pli::schema_mismatch),
        help("The line after the option header must hold exactly one value per option")
    )]
    SchemaMismatch {
        line: usize,
        names: usize,
        values: usize,
    },
    #[error("Expected {expected} on line {line}, found {found:?}")]
    #[diagnostic(code(tu_post::pli::invalid_number))]
    InvalidNumber {
        line: usize,
        expected: &'static str,
        found: String,
    },
    #[error("Unexpected end of file after line {line}, expected {expected}")]
    #[diagnostic(code(tu_post::pli::unexpected_eof))]
    UnexpectedEndOfInput { line: usize, expected: &'static str },
    #[error("Missing option {name}")]
    #[diagnostic(code(tu_post::pli::missing_option))]
    MissingOption { name: &'static str },
    #[error("Option {name} has the non-numeric value {value:?}")]
    #[diagnostic(code(tu_post::pli::invalid_option))]
    InvalidOption { name: &'static str, value: String },
    #[error("No .{extension} file is declared")]
    #[diagnostic(
        code(tu_post::pli::missing_companion),
        help("Declare the file as `<run>.{extension}` followed by its record layout")
    )]
    MissingCompanion { extension: &'static str },
}
