//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use arrayio::{Row, Value};
use rust_xlsxwriter::{Workbook, XlsxError};

pub const ROWS: usize = 200;
pub const COLS: usize = 10;

/// Header lines before the data in the text fixture
pub const HEADER: &str = "# generated fixture\n# a, b, c, d, e, f, g, h, i, j\n";

/// The table `100 * (col + row + 1)` for `ROWS` x `COLS`
pub fn values() -> Vec<Row> {
    (0..ROWS)
        .map(|j| {
            (0..COLS)
                .map(|i| Value::Int(100 * (i + j + 1) as i64))
                .collect()
        })
        .collect()
}

/// Data lines of the text fixture (lines 3 to `ROWS + 2`)
pub const LINES: (usize, usize) = (3, ROWS + 2);

/// Data cells of the workbook fixture
pub const CELLS: (&str, &str) = ("B3", "K202");

pub fn write_text_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("input.csv");
    let mut content = String::from(HEADER);
    for row in values() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        content.push_str(&line.join(", "));
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn write_workbook_fixture(dir: &Path) -> Result<PathBuf, XlsxError> {
    let path = dir.join("input.xlsx");
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("input")?;
    worksheet.write_string(0, 0, "header")?;
    for (j, row) in values().iter().enumerate() {
        for (i, value) in row.iter().enumerate() {
            if let Value::Int(n) = value {
                worksheet.write_number(2 + j as u32, 1 + i as u16, *n as f64)?;
            }
        }
    }
    workbook.save(&path)?;
    Ok(path)
}

pub fn data_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Assert that two tables hold the same values with the same types.
///
/// `Value`'s own equality treats `Int(3)` and `Float(3.0)` as equal; this
/// also requires the variants to match.
#[track_caller]
pub fn assert_same_rows(actual: &[Row], expected: &[Row]) {
    assert_eq!(actual.len(), expected.len(), "row count differs");
    for (r, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a.len(), e.len(), "row {r} has a different width");
        for (c, (a, e)) in a.iter().zip(e).enumerate() {
            assert!(
                std::mem::discriminant(a) == std::mem::discriminant(e) && a == e,
                "row {r} col {c}: {a:?} != {e:?}"
            );
        }
    }
}

/// Workbook with a sheet `base` holding `"keep me"` in A1 and an empty
/// sheet `output`
pub fn write_output_base(dir: &Path) -> Result<PathBuf, XlsxError> {
    let path = dir.join("output_base.xlsx");
    let mut workbook = Workbook::new();
    workbook
        .add_worksheet()
        .set_name("base")?
        .write_string(0, 0, "keep me")?;
    workbook.add_worksheet().set_name("output")?;
    workbook.save(&path)?;
    Ok(path)
}
