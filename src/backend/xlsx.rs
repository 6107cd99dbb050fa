//! Streaming reads of xlsx worksheets

use std::path::{Path, PathBuf};

use calamine::Data;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::coordinate;
use super::package::{self, PartStream, RichText};
use super::sheet::{convert_cell, CellRows, SheetReader, Window};
use crate::error::{Error, Result};
use crate::model::Value;

/// One worksheet of an xlsx file, parsed from disk on every read.
///
/// Only the path and the tab name are kept. Each call to
/// [`SheetReader::iter_rows`] opens the package again, loads the shared
/// string table and walks the sheet XML one `<row>` at a time, stopping
/// after the last row of the window. Rows are never collected, so a lazy
/// table over this sheet holds one row in memory at a time.
#[derive(Debug, Clone)]
pub struct XlsxSheet {
    path: PathBuf,
    name: String,
}

impl XlsxSheet {
    /// Look up sheet `name` (first sheet when `None`) of the workbook at
    /// `path`; cells are not read yet
    pub fn open(path: impl Into<PathBuf>, name: Option<&str>) -> Result<Self> {
        let path = path.into();
        let mut archive = package::open_archive(&path)?;
        let entry = package::find_sheet(&mut archive, name)?;
        debug!(path = %path.display(), sheet = %entry.name, part = %entry.part, "Found worksheet");
        Ok(Self {
            path,
            name: entry.name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tab name of the sheet
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SheetReader for XlsxSheet {
    fn iter_rows(&self, window: Window) -> Result<CellRows<'_>> {
        let mut archive = package::open_archive(&self.path)?;
        let entry = package::find_sheet(&mut archive, Some(&self.name))?;
        let strings = package::shared_strings(&mut archive)?;
        let stream = package::open_part_stream(&self.path, &mut archive, &entry.part)?;
        debug!(sheet = %self.name, window = ?window, strings = strings.len(), "Streaming worksheet");

        Ok(Box::new(StreamRows {
            xml: Reader::from_reader(stream),
            buf: Vec::new(),
            strings,
            window,
            next_row: window.min_row,
            ahead: None,
            last_row: 0,
            exhausted: false,
            done: false,
        }))
    }
}

/// What a `<c>` element holds, from its `t` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Number,
    SharedString,
    InlineString,
    /// Cached text result of a formula
    FormulaString,
    Bool,
    Error,
    Date,
}

impl CellKind {
    fn from_attr(t: Option<&[u8]>) -> Self {
        match t {
            Some(b"s") => CellKind::SharedString,
            Some(b"inlineStr") => CellKind::InlineString,
            Some(b"str") => CellKind::FormulaString,
            Some(b"b") => CellKind::Bool,
            Some(b"e") => CellKind::Error,
            Some(b"d") => CellKind::Date,
            _ => CellKind::Number,
        }
    }
}

/// Rows of the window, one `<row>` element parsed per step
struct StreamRows {
    xml: Reader<PartStream>,
    buf: Vec<u8>,
    strings: Vec<String>,
    window: Window,
    /// Row number the next item is for
    next_row: u32,
    /// A row read from the sheet that lies below `next_row`
    ahead: Option<(u32, Vec<Value>)>,
    /// Number of the last `<row>` element seen
    last_row: u32,
    /// The sheet has no more rows inside the window
    exhausted: bool,
    done: bool,
}

impl StreamRows {
    fn width(&self) -> usize {
        (self.window.max_col as usize + 1).saturating_sub(self.window.min_col as usize)
    }

    /// Parse the next `<row>` element; `None` once the sheet data ends or
    /// passes the window
    fn read_row(&mut self) -> Result<Option<(u32, Vec<Value>)>> {
        loop {
            self.buf.clear();
            let row = match self.xml.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"row" => {
                    Some((row_number(&e, self.last_row)?, true))
                }
                Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                    Some((row_number(&e, self.last_row)?, false))
                }
                Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(None),
                Event::Eof => return Ok(None),
                _ => None,
            };
            let Some((row, has_cells)) = row else {
                continue;
            };

            self.last_row = row;
            if row > self.window.max_row {
                return Ok(None);
            }
            let cells = if has_cells {
                self.read_cells()?
            } else {
                vec![Value::Empty; self.width()]
            };
            return Ok(Some((row, cells)));
        }
    }

    /// Cells of the current row that fall inside the window
    fn read_cells(&mut self) -> Result<Vec<Value>> {
        let mut cells = vec![Value::Empty; self.width()];
        let mut col = 0;
        loop {
            self.buf.clear();
            let cell = match self.xml.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"c" => {
                    col = column_number(&e, col)?;
                    let kind = e.try_get_attribute("t")?;
                    Some(CellKind::from_attr(kind.as_ref().map(|t| &*t.value)))
                }
                Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    col = column_number(&e, col)?;
                    None
                }
                Event::End(e) if e.local_name().as_ref() == b"row" => return Ok(cells),
                Event::Eof => return Ok(cells),
                _ => None,
            };
            if let Some(kind) = cell {
                let value = self.read_value(kind)?;
                if col >= self.window.min_col && col <= self.window.max_col {
                    cells[(col - self.window.min_col) as usize] = value;
                }
            }
        }
    }

    /// Value of the current `<c>` element, consuming it up to `</c>`
    fn read_value(&mut self, kind: CellKind) -> Result<Value> {
        let mut raw: Option<String> = None;
        let mut in_value = false;
        let mut inline = RichText::default();
        loop {
            self.buf.clear();
            let event = self.xml.read_event_into(&mut self.buf)?;
            match &event {
                Event::Start(e) if e.local_name().as_ref() == b"v" => in_value = true,
                Event::End(e) if e.local_name().as_ref() == b"v" => in_value = false,
                Event::End(e) if e.local_name().as_ref() == b"c" => break,
                Event::Text(t) if in_value => {
                    raw.get_or_insert_with(String::new).push_str(&t.unescape()?);
                }
                Event::Eof => break,
                _ => inline.feed(&event)?,
            }
        }
        Ok(convert_cell(&cell_data(kind, raw, inline.value, &self.strings)))
    }
}

impl Iterator for StreamRows {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_row > self.window.max_row {
            return None;
        }
        while self.ahead.is_none() && !self.exhausted {
            match self.read_row() {
                Ok(Some((row, cells))) if row >= self.next_row => self.ahead = Some((row, cells)),
                // Above the window
                Ok(Some(_)) => {}
                Ok(None) => self.exhausted = true,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }

        let row = self.next_row;
        match row.checked_add(1) {
            Some(next) => self.next_row = next,
            None => self.done = true,
        }
        match self.ahead.take() {
            Some((number, cells)) if number == row => Some(Ok(cells)),
            ahead => {
                // Rows missing from the sheet XML are blank
                self.ahead = ahead;
                Some(Ok(vec![Value::Empty; self.width()]))
            }
        }
    }
}

/// Row number from the `r` attribute, or the one after `previous`
fn row_number(e: &BytesStart<'_>, previous: u32) -> Result<u32> {
    match e.try_get_attribute("r")? {
        Some(attr) => {
            let r = String::from_utf8_lossy(&attr.value);
            r.trim().parse().map_err(|_| Error::InvalidCoordinate {
                coordinate: r.into_owned(),
            })
        }
        None => Ok(previous.saturating_add(1)),
    }
}

/// Column number from the `r` attribute, or the one after `previous`
fn column_number(e: &BytesStart<'_>, previous: u32) -> Result<u32> {
    match e.try_get_attribute("r")? {
        Some(attr) => Ok(coordinate::parse(&String::from_utf8_lossy(&attr.value))?.col),
        None => Ok(previous.saturating_add(1)),
    }
}

fn cell_data(kind: CellKind, raw: Option<String>, inline: String, strings: &[String]) -> Data {
    if kind == CellKind::InlineString {
        return Data::String(inline);
    }
    let Some(raw) = raw else {
        return Data::Empty;
    };
    match kind {
        CellKind::SharedString => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| strings.get(i))
            .map(|s| Data::String(s.clone()))
            .unwrap_or(Data::Empty),
        CellKind::Bool => Data::Bool(matches!(raw.trim(), "1" | "true")),
        CellKind::Date => Data::DateTimeIso(raw),
        CellKind::FormulaString | CellKind::Error => Data::String(raw),
        CellKind::Number | CellKind::InlineString => match raw.trim().parse::<f64>() {
            Ok(f) => Data::Float(f),
            Err(_) => Data::String(raw),
        },
    }
}

#[cfg(test)]
mod tests {
    use rust_xlsxwriter::Workbook;

    use super::*;
    use crate::backend::CellRef;

    fn window(from: &str, to: &str) -> Window {
        Window::between(
            coordinate::parse(from).unwrap(),
            coordinate::parse(to).unwrap(),
        )
    }

    fn read(sheet: &XlsxSheet, from: &str, to: &str) -> Vec<Vec<Value>> {
        sheet
            .iter_rows(window(from, to))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap()
    }

    fn workbook(path: &Path, last: f64) {
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("cover").unwrap();
        let data = workbook.add_worksheet();
        data.set_name("data").unwrap();
        data.write_string(0, 0, "title").unwrap();
        data.write_number(2, 1, 100.0).unwrap();
        data.write_number(2, 2, 2.5).unwrap();
        data.write_string(2, 3, "4.2").unwrap();
        data.write_boolean(3, 1, true).unwrap();
        data.write_number(5, 3, last).unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_streams_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        workbook(&path, 7.0);
        let sheet = XlsxSheet::open(&path, Some("data")).unwrap();

        let rows = read(&sheet, "B3", "D6");
        assert_eq!(rows.len(), 4);
        assert!(matches!(rows[0][..], [Value::Int(100), Value::Float(f), Value::Text(ref s)] if f == 2.5 && s == "4.2"));
        assert!(matches!(rows[1][..], [Value::Bool(true), Value::Empty, Value::Empty]));
        // Row 5 has no <row> element at all
        assert!(rows[2].iter().all(Value::is_empty));
        assert!(matches!(rows[3][..], [Value::Empty, Value::Empty, Value::Int(7)]));
    }

    #[test]
    fn test_window_past_used_range_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        workbook(&path, 7.0);
        let sheet = XlsxSheet::open(&path, Some("data")).unwrap();

        let rows = read(&sheet, "D6", "E8");
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(7), Value::Empty],
                vec![Value::Empty, Value::Empty],
                vec![Value::Empty, Value::Empty],
            ]
        );
        assert!(read(&sheet, "B4", "B3").is_empty());
    }

    #[test]
    fn test_first_sheet_and_shared_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        workbook(&path, 7.0);

        let cover = XlsxSheet::open(&path, None).unwrap();
        assert_eq!(cover.name(), "cover");
        assert_eq!(read(&cover, "A1", "A1"), vec![vec![Value::Empty]]);

        let data = XlsxSheet::open(&path, Some("data")).unwrap();
        assert_eq!(read(&data, "A1", "A1"), vec![vec![Value::from("title")]]);
    }

    #[test]
    fn test_every_read_sees_the_file_as_it_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        workbook(&path, 7.0);
        let sheet = XlsxSheet::open(&path, Some("data")).unwrap();
        assert!(matches!(read(&sheet, "D6", "D6")[0][..], [Value::Int(7)]));

        workbook(&path, 8.5);
        assert!(matches!(read(&sheet, "D6", "D6")[0][..], [Value::Float(f)] if f == 8.5));
    }

    #[test]
    fn test_unknown_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        workbook(&path, 7.0);
        assert!(matches!(
            XlsxSheet::open(&path, Some("missing")),
            Err(Error::SheetNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            XlsxSheet::open(dir.path().join("missing.xlsx"), None),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_cell_data_kinds() {
        let strings = vec!["zero".to_string(), "one".to_string()];
        let raw = |s: &str| Some(s.to_string());
        let value = |kind, v| convert_cell(&cell_data(kind, v, String::new(), &strings));

        assert_eq!(value(CellKind::SharedString, raw("1")), Value::from("one"));
        assert!(value(CellKind::SharedString, raw("9")).is_empty());
        assert_eq!(value(CellKind::Bool, raw("0")), Value::Bool(false));
        assert!(matches!(value(CellKind::Number, raw("3")), Value::Int(3)));
        assert!(matches!(value(CellKind::Number, raw("0.25")), Value::Float(f) if f == 0.25));
        assert_eq!(value(CellKind::Error, raw("#DIV/0!")), Value::from("#DIV/0!"));
        assert!(value(CellKind::Number, None).is_empty());
        assert_eq!(
            convert_cell(&cell_data(CellKind::InlineString, None, "inline".into(), &strings)),
            Value::from("inline")
        );
    }

    #[test]
    fn test_cells_without_references_follow_each_other() {
        let xml = br#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row><row r="3"><c r="B3"><v>5</v></c><c><v>6</v></c></row></sheetData></worksheet>"#;
        let stream: PartStream = std::io::BufReader::new(Box::new(&xml[..]) as Box<dyn std::io::Read>);
        let rows = StreamRows {
            xml: Reader::from_reader(stream),
            buf: Vec::new(),
            strings: Vec::new(),
            window: Window::between(CellRef::new(1, 1), CellRef::new(3, 3)),
            next_row: 1,
            ahead: None,
            last_row: 0,
            exhausted: false,
            done: false,
        };
        let rows: Vec<Vec<Value>> = rows.collect::<Result<_>>().unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::Int(2), Value::Empty],
                vec![Value::Empty, Value::Empty, Value::Empty],
                vec![Value::Empty, Value::Int(5), Value::Int(6)],
            ]
        );
    }
}
