//! Writing cells into an existing xlsx workbook

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::coordinate::{self, CellRef, MAX_COL, MAX_ROW};
use super::package;
use super::sheet::SheetWriter;
use crate::error::{Error, Result};
use crate::model::Value;

/// An xlsx workbook opened for editing one of its sheets.
///
/// Assigned cells are collected until [`XlsxEditor::save`], which rewrites
/// the sheet XML with those cells merged in and copies every other part of
/// the package unchanged. Other sheets, styles and untouched cells survive.
#[derive(Debug)]
pub struct XlsxEditor {
    /// Every part of the package, in archive order
    parts: Vec<(String, Vec<u8>)>,
    /// Index in `parts` of the edited worksheet
    sheet: usize,
    sheet_name: String,
    edits: BTreeMap<CellRef, Value>,
}

impl XlsxEditor {
    /// Open the workbook at `path` for editing sheet `name` (first sheet
    /// when `None`). Fails with [`Error::SheetNotFound`] for unknown names.
    pub fn open(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let mut archive = package::open_archive(path)?;
        let entry = package::find_sheet(&mut archive, name)?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)?;
            parts.push((file.name().to_string(), content));
        }
        let sheet = parts
            .iter()
            .position(|(part, _)| *part == entry.part)
            .ok_or(Error::Archive(ZipError::FileNotFound))?;

        debug!(path = %path.display(), sheet = %entry.name, parts = parts.len(), "Opened workbook for editing");
        Ok(Self {
            parts,
            sheet,
            sheet_name: entry.name,
            edits: BTreeMap::new(),
        })
    }

    /// Tab name of the sheet being edited
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Number of cells assigned so far
    pub fn pending(&self) -> usize {
        self.edits.len()
    }

    /// Write the workbook with all assigned cells to `path`.
    ///
    /// The whole package is built in memory first, so a failure leaves the
    /// file at `path` as it was.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let sheet_xml = merge_cells(&self.parts[self.sheet].1, &self.edits)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (i, (name, content)) in self.parts.iter().enumerate() {
            if name.ends_with('/') {
                zip.add_directory(name.as_str(), options)?;
                continue;
            }
            zip.start_file(name.as_str(), options)?;
            if i == self.sheet {
                zip.write_all(&sheet_xml)?;
            } else {
                zip.write_all(content)?;
            }
        }
        let bytes = zip.finish()?.into_inner();

        fs::write(path, bytes).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), sheet = %self.sheet_name, cells = self.edits.len(), "Saved workbook");
        Ok(())
    }
}

impl SheetWriter for XlsxEditor {
    fn set_cell(&mut self, at: CellRef, value: &Value) -> Result<()> {
        if at.row == 0 || at.col == 0 || at.row > MAX_ROW || at.col > MAX_COL {
            return Err(Error::CellOutOfBounds {
                row: at.row as u64,
                col: at.col as u64,
            });
        }
        self.edits.insert(at, value.clone());
        Ok(())
    }
}

/// A `<row>` of the sheet data
struct RowXml {
    number: u32,
    start: BytesStart<'static>,
    cells: Vec<CellXml>,
}

/// A `<c>` element; `body` is `None` for a self-closing cell
struct CellXml {
    col: u32,
    start: BytesStart<'static>,
    body: Option<Vec<Event<'static>>>,
}

fn is(e: &BytesStart<'_>, name: &[u8]) -> bool {
    e.local_name().as_ref() == name
}

fn malformed(what: &str) -> Error {
    Error::Xml(quick_xml::Error::UnexpectedToken(what.to_string()))
}

/// Rewrite worksheet XML with `edits` merged into its `<sheetData>`
fn merge_cells(xml: &[u8], edits: &BTreeMap<CellRef, Value>) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut events = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            event => events.push(event.into_owned()),
        }
        buf.clear();
    }

    let open = events
        .iter()
        .position(|e| matches!(e, Event::Start(s) | Event::Empty(s) if is(s, b"sheetData")))
        .ok_or_else(|| malformed("worksheet without sheetData"))?;
    let (close, sheet_data) = match &events[open] {
        Event::Start(s) => {
            let close = events[open..]
                .iter()
                .position(|e| matches!(e, Event::End(end) if end.local_name().as_ref() == b"sheetData"))
                .map(|offset| open + offset)
                .ok_or_else(|| malformed("unterminated sheetData"))?;
            (close, s.clone())
        }
        Event::Empty(s) => (open, s.clone()),
        _ => return Err(malformed("sheetData")),
    };

    let mut rows = parse_rows(&events[open + 1..close.max(open + 1)])?;
    apply_edits(&mut rows, edits);
    let extent = used_extent(&rows);

    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    for event in &events[..open] {
        match event {
            Event::Empty(e) if is(e, b"dimension") => {
                let mut dimension = BytesStart::new("dimension");
                dimension.push_attribute(("ref", extent.as_str()));
                writer.write_event(Event::Empty(dimension))?;
            }
            other => writer.write_event(other)?,
        }
    }

    writer.write_event(Event::Start(sheet_data.clone()))?;
    for row in &rows {
        write_row(&mut writer, row)?;
    }
    writer.write_event(Event::End(sheet_data.to_end().into_owned()))?;

    let rest = if close == open { open + 1 } else { close + 1 };
    for event in &events[rest..] {
        writer.write_event(event)?;
    }
    Ok(writer.into_inner())
}

/// Rows and cells between `<sheetData>` and `</sheetData>`
fn parse_rows(events: &[Event<'static>]) -> Result<Vec<RowXml>> {
    let mut rows: Vec<RowXml> = Vec::new();
    let mut i = 0;
    while i < events.len() {
        let (start, has_cells) = match &events[i] {
            Event::Start(e) if is(e, b"row") => (e, true),
            Event::Empty(e) if is(e, b"row") => (e, false),
            _ => {
                i += 1;
                continue;
            }
        };
        let previous = rows.last().map_or(0, |row| row.number);
        let mut row = RowXml {
            number: number_attr(start, previous)?,
            start: start.clone(),
            cells: Vec::new(),
        };
        i += 1;

        while has_cells && i < events.len() {
            match &events[i] {
                Event::End(e) if e.local_name().as_ref() == b"row" => break,
                Event::Start(e) if is(e, b"c") => {
                    let col = cell_column(e, row.cells.last().map_or(0, |c| c.col))?;
                    let end = events[i..]
                        .iter()
                        .position(|e| matches!(e, Event::End(end) if end.local_name().as_ref() == b"c"))
                        .map(|offset| i + offset)
                        .ok_or_else(|| malformed("unterminated cell"))?;
                    row.cells.push(CellXml {
                        col,
                        start: e.clone(),
                        body: Some(events[i + 1..end].to_vec()),
                    });
                    i = end;
                }
                Event::Empty(e) if is(e, b"c") => {
                    let col = cell_column(e, row.cells.last().map_or(0, |c| c.col))?;
                    row.cells.push(CellXml {
                        col,
                        start: e.clone(),
                        body: None,
                    });
                }
                _ => {}
            }
            i += 1;
        }
        if has_cells {
            // Skip the closing </row>
            i += 1;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn number_attr(e: &BytesStart<'_>, previous: u32) -> Result<u32> {
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

fn cell_column(e: &BytesStart<'_>, previous: u32) -> Result<u32> {
    match e.try_get_attribute("r")? {
        Some(attr) => Ok(coordinate::parse(&String::from_utf8_lossy(&attr.value))?.col),
        None => Ok(previous.saturating_add(1)),
    }
}

fn apply_edits(rows: &mut Vec<RowXml>, edits: &BTreeMap<CellRef, Value>) {
    for (&at, value) in edits {
        let r = match rows.binary_search_by_key(&at.row, |row| row.number) {
            Ok(r) => r,
            Err(_) if value.is_empty() => continue,
            Err(r) => {
                rows.insert(
                    r,
                    RowXml {
                        number: at.row,
                        start: BytesStart::new("row"),
                        cells: Vec::new(),
                    },
                );
                r
            }
        };
        let cells = &mut rows[r].cells;
        match cells.binary_search_by_key(&at.col, |cell| cell.col) {
            Ok(c) if value.is_empty() => {
                cells.remove(c);
            }
            Ok(c) => {
                let cell = &mut cells[c];
                cell.start = cell_start(at, Some(&cell.start), value);
                cell.body = Some(cell_body(value));
            }
            Err(_) if value.is_empty() => {}
            Err(c) => cells.insert(
                c,
                CellXml {
                    col: at.col,
                    start: cell_start(at, None, value),
                    body: Some(cell_body(value)),
                },
            ),
        }
    }
}

/// Start tag of an assigned cell, keeping the style of the cell it replaces
fn cell_start(at: CellRef, old: Option<&BytesStart<'_>>, value: &Value) -> BytesStart<'static> {
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", at.to_string().as_str()));
    if let Some(style) = old.and_then(|old| old.try_get_attribute("s").ok().flatten()) {
        start.push_attribute(style);
    }
    match value {
        Value::Bool(_) => start.push_attribute(("t", "b")),
        Value::Float(f) if !f.is_finite() => start.push_attribute(("t", "inlineStr")),
        Value::Text(_) => start.push_attribute(("t", "inlineStr")),
        _ => {}
    }
    start
}

fn cell_body(value: &Value) -> Vec<Event<'static>> {
    let (tag, text) = match value {
        Value::Empty => return Vec::new(),
        Value::Bool(b) => ("v", (if *b { "1" } else { "0" }).to_string()),
        Value::Int(i) => ("v", i.to_string()),
        Value::Float(f) if f.is_finite() => ("v", f.to_string()),
        Value::Float(f) => ("t", f.to_string()),
        Value::Text(s) => ("t", s.clone()),
    };
    let text = BytesText::new(&text).into_owned();
    if tag == "v" {
        return vec![
            Event::Start(BytesStart::new("v")),
            Event::Text(text),
            Event::End(BytesEnd::new("v")),
        ];
    }

    let mut t = BytesStart::new("t");
    if text.first().is_some_and(u8::is_ascii_whitespace) || text.last().is_some_and(u8::is_ascii_whitespace) {
        t.push_attribute(("xml:space", "preserve"));
    }
    vec![
        Event::Start(BytesStart::new("is")),
        Event::Start(t),
        Event::Text(text),
        Event::End(BytesEnd::new("t")),
        Event::End(BytesEnd::new("is")),
    ]
}

/// `ref` of the `<dimension>` element for the cells present
fn used_extent(rows: &[RowXml]) -> String {
    let mut cells = rows
        .iter()
        .flat_map(|row| row.cells.iter().map(move |cell| CellRef::new(row.number, cell.col)));
    let Some(first) = cells.next() else {
        return "A1".to_string();
    };
    let (min, max) = cells.fold((first, first), |(min, max), at| {
        (
            CellRef::new(min.row.min(at.row), min.col.min(at.col)),
            CellRef::new(max.row.max(at.row), max.col.max(at.col)),
        )
    });
    if min == max {
        min.to_string()
    } else {
        format!("{}:{}", min, max)
    }
}

fn write_row(writer: &mut Writer<Vec<u8>>, row: &RowXml) -> Result<()> {
    // Reference every row and cell, so inserted ones never shift
    // neighbours that relied on their position
    let mut start = BytesStart::new("row");
    start.push_attribute(("r", row.number.to_string().as_str()));
    for attr in row.start.attributes() {
        let attr = attr?;
        if !matches!(attr.key.as_ref(), b"r" | b"spans") {
            start.push_attribute(attr);
        }
    }
    if row.cells.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for cell in &row.cells {
        let mut c = BytesStart::new("c");
        c.push_attribute(("r", CellRef::new(row.number, cell.col).to_string().as_str()));
        for attr in cell.start.attributes() {
            let attr = attr?;
            if attr.key.as_ref() != b"r" {
                c.push_attribute(attr);
            }
        }
        match &cell.body {
            Some(body) => {
                writer.write_event(Event::Start(c))?;
                for event in body {
                    writer.write_event(event)?;
                }
                writer.write_event(Event::End(BytesEnd::new("c")))?;
            }
            None => writer.write_event(Event::Empty(c))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}
