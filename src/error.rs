//! Error types for reading and writing tables

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while scanning a source or writing a table
#[derive(Debug, Error)]
pub enum Error {
    /// Delimited-text source does not exist.
    #[error("No such file or directory: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// Failed to read a line of a delimited-text source.
    #[error("failed to read line {line} of {path}: {source}")]
    LineRead {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write delimited output.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a caller-supplied writer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cell coordinate is not in `A1` notation.
    #[error("invalid cell coordinate: '{coordinate}'")]
    InvalidCoordinate { coordinate: String },

    /// A target cell lies outside what the sheet can address.
    #[error("cell at row {row}, column {col} is out of bounds")]
    CellOutOfBounds { row: u64, col: u64 },

    /// Failed to open or read a workbook.
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// Workbook has no sheet with this name.
    #[error("worksheet '{name}' not found")]
    SheetNotFound { name: String },

    /// Workbook package is not a readable zip archive.
    #[error("invalid workbook package: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A part of the workbook package is not well-formed XML.
    #[error("invalid workbook XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Workbook part uses a compression method that cannot be streamed.
    #[error("unsupported compression for '{part}'")]
    UnsupportedCompression { part: String },

    /// Failed to write into an xlsx worksheet.
    #[error("failed to write worksheet: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(err.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
