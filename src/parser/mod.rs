//! Row sources over delimited text and spreadsheet ranges

mod csv;
mod excel;

use crate::error::Result;
use crate::model::Row;

pub use self::csv::{parse_line, read_csv_range, CsvRange};
pub use self::excel::{read_excel_range, SheetRange};

/// Boxed sequence of coerced rows
pub type RowIter<'r> = Box<dyn Iterator<Item = Result<Row>> + 'r>;

/// A replayable producer of rows.
///
/// Every call to [`RowSource::scan`] starts over from the first row of the
/// range and re-reads the underlying source.
pub trait RowSource {
    /// Start a fresh scan of the whole range
    fn scan(&self) -> Result<RowIter<'_>>;

    /// Number of rows a full scan yields, when known up front
    fn total(&self) -> Option<u64>;
}
