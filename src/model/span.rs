//! Inclusive scan bounds

use std::ops::RangeInclusive;

/// Inclusive bounds of a scan: one index, or a `(start, end)` pair
///
/// For delimited text the indices are 1-based line numbers, for
/// spreadsheets they are cell coordinates such as `"B3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span<T> {
    Single(T),
    Between(T, T),
}

impl<T: Clone> Span<T> {
    /// First and last index, both inclusive
    pub fn bounds(&self) -> (T, T) {
        match self {
            Span::Single(at) => (at.clone(), at.clone()),
            Span::Between(from, to) => (from.clone(), to.clone()),
        }
    }
}

impl From<usize> for Span<usize> {
    fn from(line: usize) -> Self {
        Span::Single(line)
    }
}

impl<'a> From<&'a str> for Span<&'a str> {
    fn from(cell: &'a str) -> Self {
        Span::Single(cell)
    }
}

impl<T> From<(T, T)> for Span<T> {
    fn from((from, to): (T, T)) -> Self {
        Span::Between(from, to)
    }
}

impl From<RangeInclusive<usize>> for Span<usize> {
    fn from(range: RangeInclusive<usize>) -> Self {
        let (from, to) = range.into_inner();
        Span::Between(from, to)
    }
}
