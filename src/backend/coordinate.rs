//! `A1`-style cell coordinates

use crate::error::{Error, Result};

/// Largest column addressable in a worksheet (`XFD`)
pub const MAX_COL: u32 = 16_384;

/// Largest row addressable in a worksheet
pub const MAX_ROW: u32 = 1_048_576;

/// A 1-indexed (row, column) cell position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// The cell `rows` below and `cols` right of this one
    pub fn offset(self, rows: usize, cols: usize) -> Result<CellRef> {
        let out_of_bounds = || Error::CellOutOfBounds {
            row: (self.row as u64).saturating_add(rows as u64),
            col: (self.col as u64).saturating_add(cols as u64),
        };
        let row = u32::try_from(rows)
            .ok()
            .and_then(|r| self.row.checked_add(r))
            .ok_or_else(out_of_bounds)?;
        let col = u32::try_from(cols)
            .ok()
            .and_then(|c| self.col.checked_add(c))
            .ok_or_else(out_of_bounds)?;
        Ok(CellRef { row, col })
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl std::str::FromStr for CellRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Convert a coordinate such as `"B3"` or `"$AA$10"` to `(row, col)`.
///
/// Column letters are case-insensitive. Rows and columns are 1-indexed.
pub fn parse(coordinate: &str) -> Result<CellRef> {
    let invalid = || Error::InvalidCoordinate {
        coordinate: coordinate.to_string(),
    };

    let rest = coordinate.strip_prefix('$').unwrap_or(coordinate);
    let split = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .ok_or_else(invalid)?;
    let (letters, digits) = rest.split_at(split);
    let digits = digits.strip_prefix('$').unwrap_or(digits);

    if letters.is_empty() || letters.len() > 3 {
        return Err(invalid());
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    // A=1, B=2, ..., Z=26, AA=27, ...
    let col = letters
        .bytes()
        .map(|b| (b.to_ascii_uppercase() - b'A') as u32 + 1)
        .fold(0u32, |acc, v| acc * 26 + v);
    let row: u32 = digits.parse().map_err(|_| invalid())?;

    if row == 0 || row > MAX_ROW || col > MAX_COL {
        return Err(invalid());
    }
    Ok(CellRef { row, col })
}

/// Convert a 1-indexed column number to its letters (`1` -> `A`)
pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
