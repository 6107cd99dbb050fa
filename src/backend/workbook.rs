//! Opening workbooks from disk

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::debug;

use super::sheet::{CellRows, SheetReader, Window};
use super::xlsx::XlsxSheet;
use crate::error::Result;

/// Load one sheet of a workbook (xlsx, xlsm, xlsb, xls, ods) into memory.
///
/// Without a name the first sheet is used.
pub fn open_sheet(path: &Path, sheet_name: Option<&str>) -> Result<Range<Data>> {
    let mut workbook = open_workbook_auto(path)?;

    let sheet_name = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(calamine::Error::Msg("No sheets found in workbook"))?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    debug!(
        path = %path.display(),
        sheet = %sheet_name,
        size = ?range.get_size(),
        "Loaded worksheet"
    );
    Ok(range)
}

/// A workbook sheet ready to be read
#[derive(Debug, Clone)]
pub enum WorkbookSheet {
    /// Office Open XML sheet, streamed from disk on every read
    Streamed(XlsxSheet),
    /// Sheet of another format, held in memory
    Loaded(Range<Data>),
}

/// Open one sheet of a workbook, streaming it when the format allows.
///
/// `.xlsx` and `.xlsm` files are streamed so a lazy table never holds more
/// than a row of the sheet; other formats are loaded with [`open_sheet`].
pub fn open_workbook_sheet(path: &Path, sheet_name: Option<&str>) -> Result<WorkbookSheet> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match extension.as_str() {
        "xlsx" | "xlsm" => Ok(WorkbookSheet::Streamed(XlsxSheet::open(path, sheet_name)?)),
        _ => Ok(WorkbookSheet::Loaded(open_sheet(path, sheet_name)?)),
    }
}

impl SheetReader for WorkbookSheet {
    fn iter_rows(&self, window: Window) -> Result<CellRows<'_>> {
        match self {
            WorkbookSheet::Streamed(sheet) => sheet.iter_rows(window),
            WorkbookSheet::Loaded(range) => range.iter_rows(window),
        }
    }
}
