//! Spreadsheet grids that rows can be read from and written into

use calamine::{Data, Range};
use rust_xlsxwriter::Worksheet;
use rustc_hash::FxHashMap;

use super::coordinate::CellRef;
use crate::error::{Error, Result};
use crate::model::Value;

/// Boxed sequence of raw cell rows
pub type CellRows<'s> = Box<dyn Iterator<Item = Result<Vec<Value>>> + 's>;

/// Inclusive 1-indexed block of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

impl Window {
    /// Block spanned by two corner cells
    pub fn between(start: CellRef, end: CellRef) -> Self {
        Self {
            min_row: start.row,
            max_row: end.row,
            min_col: start.col,
            max_col: end.col,
        }
    }

    /// Number of rows in the block; zero when the corners are inverted
    pub fn row_count(&self) -> u64 {
        (self.max_row as u64 + 1).saturating_sub(self.min_row as u64)
    }
}

/// A sheet whose cell values can be streamed row by row
pub trait SheetReader {
    /// Stream the values (no formatting) of every row in `window`.
    ///
    /// Each row has one entry per column of the window; missing cells are
    /// `Value::Empty`.
    fn iter_rows(&self, window: Window) -> Result<CellRows<'_>>;
}

/// A sheet whose cells can be assigned
pub trait SheetWriter {
    /// Assign `value` to the cell at `at`. `Value::Empty` clears the cell.
    fn set_cell(&mut self, at: CellRef, value: &Value) -> Result<()>;
}

impl<S: SheetReader + ?Sized> SheetReader for &S {
    fn iter_rows(&self, window: Window) -> Result<CellRows<'_>> {
        (**self).iter_rows(window)
    }
}

impl SheetReader for Range<Data> {
    fn iter_rows(&self, window: Window) -> Result<CellRows<'_>> {
        Ok(Box::new((window.min_row..=window.max_row).map(move |row| {
            Ok((window.min_col..=window.max_col)
                .map(|col| {
                    row.checked_sub(1)
                        .zip(col.checked_sub(1))
                        .and_then(|at| self.get_value(at))
                        .map(convert_cell)
                        .unwrap_or(Value::Empty)
                })
                .collect())
        })))
    }
}

/// Map a calamine cell to a source value
pub(crate) fn convert_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => {
            // Workbooks store every number as a double
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Value::Int(*f as i64)
            } else {
                Value::Float(*f)
            }
        }
        Data::Int(i) => Value::Int(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::Text(format!("{}", dt)),
        Data::DateTimeIso(s) => Value::Text(s.clone()),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(format!("#{:?}", e)),
    }
}

impl SheetWriter for Worksheet {
    fn set_cell(&mut self, at: CellRef, value: &Value) -> Result<()> {
        let row = at.row.checked_sub(1);
        let col = at.col.checked_sub(1).and_then(|c| u16::try_from(c).ok());
        let (row, col) = match (row, col) {
            (Some(row), Some(col)) => (row, col),
            _ => {
                return Err(Error::CellOutOfBounds {
                    row: at.row as u64,
                    col: at.col as u64,
                })
            }
        };

        match value {
            Value::Empty => {
                self.clear_cell(row, col);
            }
            Value::Bool(b) => {
                self.write_boolean(row, col, *b)?;
            }
            Value::Int(i) => {
                self.write_number(row, col, *i as f64)?;
            }
            Value::Float(f) => {
                self.write_number(row, col, *f)?;
            }
            Value::Text(s) => {
                self.write_string(row, col, s.as_str())?;
            }
        }
        Ok(())
    }
}

/// Sparse in-memory sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheet {
    cells: FxHashMap<CellRef, Value>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sheet holding `rows` with the first value at `origin`
    pub fn from_rows(origin: CellRef, rows: &[Vec<Value>]) -> Result<Self> {
        let mut sheet = Self::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.set_cell(origin.offset(r, c)?, value)?;
            }
        }
        Ok(sheet)
    }

    /// Value at `at`, if the cell is set
    pub fn get(&self, at: CellRef) -> Option<&Value> {
        self.cells.get(&at)
    }

    /// Number of non-empty cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl SheetReader for MemorySheet {
    fn iter_rows(&self, window: Window) -> Result<CellRows<'_>> {
        Ok(Box::new((window.min_row..=window.max_row).map(move |row| {
            Ok((window.min_col..=window.max_col)
                .map(|col| {
                    self.get(CellRef::new(row, col))
                        .cloned()
                        .unwrap_or(Value::Empty)
                })
                .collect())
        })))
    }
}

impl SheetWriter for MemorySheet {
    fn set_cell(&mut self, at: CellRef, value: &Value) -> Result<()> {
        if value.is_empty() {
            self.cells.remove(&at);
        } else {
            self.cells.insert(at, value.clone());
        }
        Ok(())
    }
}
