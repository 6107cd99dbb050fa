//! Cell-range reader over spreadsheet sheets

use tracing::debug;

use crate::backend::{coordinate, SheetReader, Window};
use crate::config::Config;
use crate::error::Result;
use crate::model::{coerce, Span, Table};

use super::{RowIter, RowSource};

/// Rectangular block of a sheet between two corner coordinates
#[derive(Debug, Clone)]
pub struct SheetRange<S> {
    sheet: S,
    window: Window,
}

impl<S: SheetReader> SheetRange<S> {
    /// Resolve `span` (e.g. `"B3"` or `("B3", "K20")`) against `sheet`
    pub fn new<'c>(sheet: S, span: impl Into<Span<&'c str>>) -> Result<Self> {
        let (from, to) = span.into().bounds();
        let window = Window::between(coordinate::parse(from)?, coordinate::parse(to)?);
        Ok(Self { sheet, window })
    }

    pub fn window(&self) -> Window {
        self.window
    }
}

impl<S: SheetReader> RowSource for SheetRange<S> {
    fn scan(&self) -> Result<RowIter<'_>> {
        debug!(window = ?self.window, "Scanning sheet rows");
        let rows = self.sheet.iter_rows(self.window)?;
        Ok(Box::new(rows.map(|row| {
            row.map(|cells| cells.into_iter().map(coerce).collect())
        })))
    }

    fn total(&self) -> Option<u64> {
        Some(self.window.row_count())
    }
}

/// Build a table over the cells `span` of `sheet`.
///
/// Lazy tables borrow the sheet and re-read it on every drain until
/// materialized.
pub fn read_excel_range<'s, 'c, S>(
    sheet: S,
    span: impl Into<Span<&'c str>>,
    lazy: bool,
    config: Config,
) -> Result<Table<'s>>
where
    S: SheetReader + 's,
{
    Table::from_source(SheetRange::new(sheet, span)?, lazy, config)
}
