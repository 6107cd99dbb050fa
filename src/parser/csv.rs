//! Line-range reader for comma/whitespace separated text

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::backend::LineCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{coerce_token, Row, Span, Table};

use super::{RowIter, RowSource};

/// Inclusive range of 1-indexed lines in a text file
#[derive(Debug, Clone)]
pub struct CsvRange {
    path: PathBuf,
    from: usize,
    to: usize,
}

impl CsvRange {
    /// Fails with [`Error::SourceNotFound`] if `path` does not exist
    pub fn new(path: impl AsRef<Path>, span: impl Into<Span<usize>>) -> Result<Self> {
        let path = path.as_ref();
        if !LineCache::exists(path) {
            return Err(Error::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let (from, to) = span.into().bounds();
        Ok(Self {
            path: path.to_path_buf(),
            from,
            to,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSource for CsvRange {
    fn scan(&self) -> Result<RowIter<'_>> {
        debug!(path = %self.path.display(), from = self.from, to = self.to, "Scanning lines");

        // A new cache per scan, so replays see the file as it is now
        let mut lines = LineCache::new(&self.path);
        Ok(Box::new((self.from..=self.to).map(move |lineno| {
            let line = lines.get_line(lineno).map_err(|source| Error::LineRead {
                path: self.path.clone(),
                line: lineno,
                source,
            })?;
            Ok(parse_line(&line))
        })))
    }

    fn total(&self) -> Option<u64> {
        match self.to.checked_sub(self.from) {
            Some(span) => Some((span as u64).saturating_add(1)),
            None => Some(0),
        }
    }
}

/// Split a line on commas and runs of whitespace, coercing each token
pub fn parse_line(line: &str) -> Row {
    line.replace(',', " ")
        .split_whitespace()
        .map(coerce_token)
        .collect()
}

/// Build a table over lines `span` of the text file at `path`.
///
/// Eager tables read the range immediately; lazy tables re-read it on every
/// drain until materialized.
pub fn read_csv_range(
    path: impl AsRef<Path>,
    span: impl Into<Span<usize>>,
    lazy: bool,
    config: Config,
) -> Result<Table<'static>> {
    Table::from_source(CsvRange::new(path, span)?, lazy, config)
}
