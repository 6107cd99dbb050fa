//! arrayio - Lazy or eager tables over text and spreadsheet ranges
//!
//! Reads a rectangular range of values from a comma/whitespace separated
//! text file or from a spreadsheet, either straight into memory or as a
//! lazy table that re-reads its source whenever rows are needed, and
//! writes tables back out as delimited text or into a sheet.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod parser;
pub mod progress;

pub use config::Config;
pub use error::{Error, Result};
pub use model::{coerce, Row, Span, Table, Value};
pub use parser::{read_csv_range, read_excel_range};
