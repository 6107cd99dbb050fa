//! Collaborators that talk to files, sheets and coordinates

pub mod coordinate;
pub mod editor;
pub mod lines;
mod package;
pub mod sheet;
pub mod workbook;
pub mod xlsx;

pub use coordinate::CellRef;
pub use editor::XlsxEditor;
pub use lines::LineCache;
pub use sheet::{MemorySheet, SheetReader, SheetWriter, Window};
pub use workbook::{open_sheet, open_workbook_sheet, WorkbookSheet};
pub use xlsx::XlsxSheet;
