//! Table: rows held in memory or re-read from their source on demand

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use super::value::{Row, Value};
use crate::backend::{coordinate, SheetWriter};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::parser::RowSource;
use crate::progress::{self, LAZY_READING, LAZY_WRITING, READING, WRITING};

/// Separator placed between fields of delimited output
pub const FIELD_SEPARATOR: &str = ", ";

/// Sequence of rows produced by a drain
type Drain<'r> = Box<dyn Iterator<Item = Result<Cow<'r, [Value]>>> + 'r>;

/// Where a table's rows come from
enum State<'a> {
    /// Rows held in memory
    Eager(Vec<Row>),
    /// Rows re-read from the source on each drain
    Lazy(Box<dyn RowSource + 'a>),
}

/// A rectangular table of values.
///
/// An eager table holds its rows in memory. A lazy table keeps only the
/// source and re-reads it every time rows are needed, until
/// [`Table::materialize`] turns it eager for good.
pub struct Table<'a> {
    state: State<'a>,
    config: Config,
}

impl Table<'static> {
    /// Create an eager table from rows already in memory
    pub fn from_rows(rows: Vec<Row>, config: Config) -> Self {
        Self {
            state: State::Eager(rows),
            config,
        }
    }
}

impl From<Vec<Row>> for Table<'static> {
    fn from(rows: Vec<Row>) -> Self {
        Table::from_rows(rows, Config::default())
    }
}

impl<'a> Table<'a> {
    /// Create a table over `source`.
    ///
    /// When `lazy` is false the source is read to the end right away.
    pub fn from_source(source: impl RowSource + 'a, lazy: bool, config: Config) -> Result<Self> {
        let source: Box<dyn RowSource + 'a> = Box::new(source);
        let state = if lazy {
            State::Lazy(source)
        } else {
            let rows = read_all(source.as_ref(), READING, &config)?;
            debug!(rows = rows.len(), "Read table eagerly");
            State::Eager(rows)
        };
        Ok(Self { state, config })
    }

    /// Whether rows are still re-read from the source on each drain
    pub fn is_lazy(&self) -> bool {
        matches!(self.state, State::Lazy(_))
    }

    /// Rows held in memory, if the table is eager
    pub fn cached_rows(&self) -> Option<&[Row]> {
        match &self.state {
            State::Eager(rows) => Some(rows),
            State::Lazy(_) => None,
        }
    }

    /// Settings the table was built with
    pub fn config(&self) -> Config {
        self.config
    }

    /// Read every row into memory and return them.
    ///
    /// A lazy table reads its source once here and stays eager afterwards;
    /// later calls return the same rows without reading again. On error
    /// the table is left unchanged.
    pub fn materialize(&mut self) -> Result<&[Row]> {
        if let State::Lazy(source) = &self.state {
            let rows = read_all(source.as_ref(), LAZY_READING, &self.config)?;
            info!(rows = rows.len(), "Materialized lazy table");
            self.state = State::Eager(rows);
        }
        Ok(self.cached_rows().unwrap_or_default())
    }

    /// Materialize and take ownership of the rows
    pub fn into_rows(mut self) -> Result<Vec<Row>> {
        self.materialize()?;
        match self.state {
            State::Eager(rows) => Ok(rows),
            State::Lazy(_) => Ok(Vec::new()),
        }
    }

    /// Append every row to the text file at `path`, one line per row with
    /// fields separated by `", "`.
    ///
    /// The file is created if missing and never truncated. A lazy table
    /// re-reads its source for this call and stays lazy. Returns the
    /// number of rows written.
    pub fn write_delimited(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let to_write_error = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(to_write_error)?;
        let mut writer = BufWriter::new(file);

        let written = self.write_delimited_to(&mut writer).map_err(|err| match err {
            Error::Io(source) => to_write_error(source),
            other => other,
        })?;
        info!(path = %path.display(), rows = written, "Appended rows");
        Ok(written)
    }

    /// Write every row as a delimited line to `writer`
    pub fn write_delimited_to<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = 0;
        for row in self.drain(WRITING, LAZY_WRITING)? {
            let row = row?;
            let line = row
                .iter()
                .map(|value| value.display())
                .collect::<Vec<_>>()
                .join(FIELD_SEPARATOR);
            writeln!(writer, "{}", line)?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    /// Assign every value to `sheet`, the first row starting at `origin`
    /// (e.g. `"B3"`) and each following row one line below.
    ///
    /// Only the touched cells change. Returns the number of rows written.
    pub fn write_spreadsheet<S>(&self, sheet: &mut S, origin: &str) -> Result<usize>
    where
        S: SheetWriter + ?Sized,
    {
        let origin = coordinate::parse(origin)?;
        let mut written = 0;
        for (r, row) in self.drain(WRITING, LAZY_WRITING)?.enumerate() {
            let row = row?;
            for (c, value) in row.iter().enumerate() {
                sheet.set_cell(origin.offset(r, c)?, value)?;
            }
            written += 1;
        }
        info!(origin = %origin, rows = written, "Wrote rows to sheet");
        Ok(written)
    }

    /// Produce every row once, from memory or from a fresh scan of the
    /// source; the table itself is not modified
    fn drain(&self, eager_label: &'static str, lazy_label: &'static str) -> Result<Drain<'_>> {
        match &self.state {
            State::Eager(rows) => {
                let iter = rows
                    .iter()
                    .map(|row| Ok::<_, Error>(Cow::Borrowed(row.as_slice())));
                Ok(progress::track(
                    iter,
                    eager_label,
                    Some(rows.len() as u64),
                    self.config.progress,
                ))
            }
            State::Lazy(source) => {
                let iter = source
                    .scan()?
                    .map(|row| row.map(Cow::<[Value]>::Owned));
                Ok(progress::track(
                    iter,
                    lazy_label,
                    source.total(),
                    self.config.progress,
                ))
            }
        }
    }
}

fn read_all(source: &dyn RowSource, label: &'static str, config: &Config) -> Result<Vec<Row>> {
    progress::track(source.scan()?, label, source.total(), config.progress).collect()
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Table");
        match &self.state {
            State::Eager(rows) => debug.field("rows", &rows.len()),
            State::Lazy(source) => debug.field("lazy", &true).field("total", &source.total()),
        };
        debug.field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::backend::{CellRef, MemorySheet};
    use crate::parser::RowIter;

    /// Source yielding `rows` and counting how often it was scanned
    struct Counting {
        rows: Vec<Row>,
        scans: Cell<usize>,
        fail_at: Option<usize>,
    }

    impl Counting {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                rows,
                scans: Cell::new(0),
                fail_at: None,
            }
        }
    }

    impl RowSource for &Counting {
        fn scan(&self) -> Result<RowIter<'_>> {
            self.scans.set(self.scans.get() + 1);
            let fail_at = self.fail_at;
            Ok(Box::new(self.rows.iter().enumerate().map(move |(i, row)| {
                if Some(i) == fail_at {
                    Err(Error::Io(std::io::Error::other("source went away")))
                } else {
                    Ok(row.clone())
                }
            })))
        }

        fn total(&self) -> Option<u64> {
            Some(self.rows.len() as u64)
        }
    }

    /// Equal values with equal variants; `Int(1)` does not match `Float(1.0)`
    #[track_caller]
    fn assert_same_rows(actual: &[Row], expected: &[Row]) {
        let same = actual.len() == expected.len()
            && actual.iter().zip(expected).all(|(a, e)| {
                a.len() == e.len()
                    && a.iter().zip(e).all(|(a, e)| {
                        std::mem::discriminant(a) == std::mem::discriminant(e) && a == e
                    })
            });
        assert!(same, "{actual:?} != {expected:?}");
    }

    fn rows() -> Vec<Row> {
        vec![
            vec![Value::Int(1), Value::Float(2.5)],
            vec![Value::from("x"), Value::Int(4)],
            vec![Value::Int(5), Value::Int(6)],
        ]
    }

    #[test]
    fn test_eager_reads_once_at_construction() {
        let source = Counting::new(rows());
        let mut table = Table::from_source(&source, false, Config::quiet()).unwrap();
        assert_eq!(source.scans.get(), 1);
        assert!(!table.is_lazy());

        assert_same_rows(table.materialize().unwrap(), &rows());
        let mut out = Vec::new();
        table.write_delimited_to(&mut out).unwrap();
        assert_eq!(source.scans.get(), 1);
    }

    #[test]
    fn test_lazy_reads_on_every_drain() {
        let source = Counting::new(rows());
        let table = Table::from_source(&source, true, Config::quiet()).unwrap();
        assert_eq!(source.scans.get(), 0);

        let mut out = Vec::new();
        table.write_delimited_to(&mut out).unwrap();
        table.write_delimited_to(&mut out).unwrap();
        assert_eq!(source.scans.get(), 2);
        assert!(table.is_lazy());
        assert!(table.cached_rows().is_none());
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let source = Counting::new(rows());
        let mut table = Table::from_source(&source, true, Config::quiet()).unwrap();

        let first = table.materialize().unwrap().to_vec();
        let second = table.materialize().unwrap().to_vec();
        assert_same_rows(&first, &second);
        assert_eq!(source.scans.get(), 1);
        assert!(!table.is_lazy());

        // Writing after materializing uses the cached rows
        let mut out = Vec::new();
        table.write_delimited_to(&mut out).unwrap();
        assert_eq!(source.scans.get(), 1);
    }

    #[test]
    fn test_failed_materialize_leaves_table_lazy() {
        let mut source = Counting::new(rows());
        source.fail_at = Some(1);
        let mut table = Table::from_source(&source, true, Config::quiet()).unwrap();

        assert!(table.materialize().is_err());
        assert!(table.is_lazy());
        assert!(table.cached_rows().is_none());
    }

    #[test]
    fn test_failed_eager_construction() {
        let mut source = Counting::new(rows());
        source.fail_at = Some(2);
        assert!(Table::from_source(&source, false, Config::quiet()).is_err());
    }

    #[test]
    fn test_write_delimited_format() {
        let table = Table::from_rows(rows(), Config::quiet());
        let mut out = Vec::new();
        assert_eq!(table.write_delimited_to(&mut out).unwrap(), 3);
        assert_eq!(String::from_utf8(out).unwrap(), "1, 2.5\nx, 4\n5, 6\n");
    }

    #[test]
    fn test_write_spreadsheet_at_origin() {
        let table = Table::from_rows(rows(), Config::quiet());
        let mut sheet = MemorySheet::new();
        sheet.set_cell(CellRef::new(1, 1), &Value::from("keep")).unwrap();

        assert_eq!(table.write_spreadsheet(&mut sheet, "B3").unwrap(), 3);
        assert_eq!(sheet.get(CellRef::new(3, 2)), Some(&Value::Int(1)));
        assert_eq!(sheet.get(CellRef::new(3, 3)), Some(&Value::Float(2.5)));
        assert_eq!(sheet.get(CellRef::new(4, 2)), Some(&Value::from("x")));
        assert_eq!(sheet.get(CellRef::new(5, 3)), Some(&Value::Int(6)));
        assert_eq!(sheet.get(CellRef::new(1, 1)), Some(&Value::from("keep")));
        assert_eq!(sheet.len(), 7);
    }

    #[test]
    fn test_write_spreadsheet_invalid_origin() {
        let table = Table::from_rows(rows(), Config::quiet());
        let mut sheet = MemorySheet::new();
        assert!(matches!(
            table.write_spreadsheet(&mut sheet, "B0"),
            Err(Error::InvalidCoordinate { .. })
        ));
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_into_rows() {
        let source = Counting::new(rows());
        let table = Table::from_source(&source, true, Config::quiet()).unwrap();
        assert_same_rows(&table.into_rows().unwrap(), &rows());
    }

    #[test]
    fn test_rows_keep_their_variants() {
        let rows = vec![vec![Value::Float(100.0), Value::Int(100)]];
        let table = Table::from_rows(rows.clone(), Config::quiet());
        assert_same_rows(&table.into_rows().unwrap(), &rows);
    }

    #[test]
    #[should_panic]
    fn test_strict_comparison_tells_int_from_float() {
        assert_same_rows(&[vec![Value::Float(100.0)]], &[vec![Value::Int(100)]]);
    }

    #[test]
    fn test_progress_does_not_change_rows() {
        let source = Counting::new(rows());
        let mut table = Table::from_source(&source, true, Config::default()).unwrap();
        assert_same_rows(table.materialize().unwrap(), &rows());
    }
}
