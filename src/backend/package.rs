//! Parts of an xlsx package: sheet lookup, shared strings and part streams

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::DeflateDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use rustc_hash::FxHashMap;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

use crate::error::{Error, Result};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Uncompressed bytes of one package part, read straight from disk
pub(crate) type PartStream = BufReader<Box<dyn Read>>;

/// A worksheet listed in the workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetEntry {
    /// Tab name
    pub name: String,
    /// Path of the worksheet XML inside the archive
    pub part: String,
}

pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// Read a whole part into memory
pub(crate) fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name)?;
    let mut content = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut content)?;
    Ok(content)
}

/// Find a worksheet by tab name, or the first one when `name` is `None`
pub(crate) fn find_sheet<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: Option<&str>,
) -> Result<SheetEntry> {
    let mut sheets = list_sheets(archive)?.into_iter();
    match name {
        Some(name) => sheets
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| Error::SheetNotFound {
                name: name.to_string(),
            }),
        None => sheets
            .next()
            .ok_or(Error::Workbook(calamine::Error::Msg("No sheets found in workbook"))),
    }
}

/// Worksheets in tab order
pub(crate) fn list_sheets<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<SheetEntry>> {
    let targets = relationship_targets(&read_part(archive, WORKBOOK_RELS_PART)?)?;
    let workbook = read_part(archive, WORKBOOK_PART)?;

    let mut reader = Reader::from_reader(workbook.as_slice());
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"name" {
                        name = Some(attr.decode_and_unescape_value(&reader)?.into_owned());
                    } else if attr.key.local_name().as_ref() == b"id" {
                        // r:id, the relationship pointing at the sheet part
                        id = Some(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
                let target = id.as_ref().and_then(|id| targets.get(id));
                if let (Some(name), Some(target)) = (name, target) {
                    sheets.push(SheetEntry {
                        name,
                        part: resolve_target(target),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// `Id -> Target` for every relationship in a `.rels` part
fn relationship_targets(xml: &[u8]) -> Result<FxHashMap<String, String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut targets = FxHashMap::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr.decode_and_unescape_value(&reader)?.into_owned()),
                        b"Target" => target = Some(attr.decode_and_unescape_value(&reader)?.into_owned()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

/// Archive path of a workbook relationship target
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// The shared string table, empty when the package has none
pub(crate) fn shared_strings<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let content = match read_part(archive, SHARED_STRINGS_PART) {
        Ok(content) => content,
        Err(Error::Archive(ZipError::FileNotFound)) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut reader = Reader::from_reader(content.as_slice());
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut text = RichText::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => text = RichText::default(),
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) if e.local_name().as_ref() == b"si" => {
                strings.push(std::mem::take(&mut text.value));
            }
            Event::Eof => break,
            event => text.feed(&event)?,
        }
        buf.clear();
    }

    Ok(strings)
}

/// Text collected from the `<t>` runs of a string item, leaving out
/// phonetic hints
#[derive(Debug, Default)]
pub(crate) struct RichText {
    pub value: String,
    in_text: bool,
    in_phonetic: bool,
}

impl RichText {
    pub fn feed(&mut self, event: &Event<'_>) -> Result<()> {
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => self.in_text = !self.in_phonetic,
                b"rPh" => self.in_phonetic = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => self.in_text = false,
                b"rPh" => self.in_phonetic = false,
                _ => {}
            },
            Event::Text(t) if self.in_text => self.value.push_str(&t.unescape()?),
            Event::CData(t) if self.in_text => {
                self.value.push_str(&String::from_utf8_lossy(t));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Open `part` of the package at `path` as a stream that owns its file
/// handle.
///
/// The archive is only used to locate the part. Its bytes are read through
/// a second handle, so the stream outlives the archive and nothing but the
/// current buffer is held in memory.
pub(crate) fn open_part_stream<R: Read + Seek>(
    path: &Path,
    archive: &mut ZipArchive<R>,
    part: &str,
) -> Result<PartStream> {
    let (start, size, method) = {
        let file = archive.by_name(part)?;
        (file.data_start(), file.compressed_size(), file.compression())
    };

    let mut handle = File::open(path)?;
    handle.seek(SeekFrom::Start(start))?;
    let raw = BufReader::new(handle).take(size);

    let inner: Box<dyn Read> = match method {
        CompressionMethod::Stored => Box::new(raw),
        CompressionMethod::Deflated => Box::new(DeflateDecoder::new(raw)),
        _ => {
            return Err(Error::UnsupportedCompression {
                part: part.to_string(),
            })
        }
    };
    Ok(BufReader::new(inner))
}
