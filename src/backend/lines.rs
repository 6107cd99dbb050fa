//! Random access to individual lines of a text file

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Byte order mark some editors put at the start of UTF-8 files
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Line-number access to a file without holding its contents in memory.
///
/// Only the byte offset of each line start seen so far is remembered.
/// Reading lines in ascending order touches the file once; jumping back
/// seeks straight to the remembered offset.
#[derive(Debug)]
pub struct LineCache {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    /// `offsets[i]` is the byte offset where line `i + 1` starts
    offsets: Vec<u64>,
    /// Current position of `reader`
    pos: u64,
    eof: bool,
}

impl LineCache {
    /// Create a cache for `path`; the file is opened on first access
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            offsets: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Path this cache reads from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether a source path exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Drop the open handle and every remembered offset, so the next
    /// access sees the file as it is now
    pub fn clear_cache(&mut self) {
        self.reader = None;
        self.offsets.clear();
        self.pos = 0;
        self.eof = false;
    }

    /// Get line `lineno` (1-indexed) including its line terminator.
    ///
    /// Line 0 and lines past the end of the file are empty strings. A UTF-8
    /// byte order mark at the start of the file is not part of line 1.
    pub fn get_line(&mut self, lineno: usize) -> std::io::Result<String> {
        if lineno == 0 {
            return Ok(String::new());
        }
        if self.reader.is_none() {
            self.reader = Some(BufReader::new(File::open(&self.path)?));
            self.offsets = vec![0];
            self.pos = 0;
            self.eof = false;
        }

        // Walk forward until the start of the requested line is known
        while self.offsets.len() < lineno {
            if self.eof {
                return Ok(String::new());
            }
            let start = self.offsets[self.offsets.len() - 1];
            let mut skipped = Vec::new();
            let read = self.read_at(start, &mut skipped)?;
            if read == 0 {
                self.eof = true;
            } else {
                self.offsets.push(start + read as u64);
            }
        }

        let mut line = Vec::new();
        let read = self.read_at(self.offsets[lineno - 1], &mut line)?;
        if read == 0 {
            self.eof = true;
        } else if self.offsets.len() == lineno {
            self.offsets.push(self.offsets[lineno - 1] + read as u64);
        }
        if lineno == 1 && line.starts_with(UTF8_BOM) {
            line.drain(..UTF8_BOM.len());
        }
        String::from_utf8(line)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Read one raw line starting at byte `offset`, seeking only when the
    /// reader is elsewhere
    fn read_at(&mut self, offset: u64, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(0),
        };
        if self.pos != offset {
            reader.seek(SeekFrom::Start(offset))?;
        }
        let read = reader.read_until(b'\n', buf)?;
        self.pos = offset + read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_sequential_and_random_access() {
        let file = fixture("one\ntwo\nthree\n");
        let mut cache = LineCache::new(file.path());

        assert_eq!(cache.get_line(1).unwrap(), "one\n");
        assert_eq!(cache.get_line(2).unwrap(), "two\n");
        assert_eq!(cache.get_line(3).unwrap(), "three\n");
        assert_eq!(cache.get_line(1).unwrap(), "one\n");
        assert_eq!(cache.get_line(3).unwrap(), "three\n");
    }

    #[test]
    fn test_jump_ahead() {
        let file = fixture("a\nb\nc\nd");
        let mut cache = LineCache::new(file.path());

        assert_eq!(cache.get_line(4).unwrap(), "d");
        assert_eq!(cache.get_line(2).unwrap(), "b\n");
    }

    #[test]
    fn test_out_of_range_is_empty() {
        let file = fixture("only\n");
        let mut cache = LineCache::new(file.path());

        assert_eq!(cache.get_line(0).unwrap(), "");
        assert_eq!(cache.get_line(2).unwrap(), "");
        assert_eq!(cache.get_line(10).unwrap(), "");
        assert_eq!(cache.get_line(1).unwrap(), "only\n");
    }

    #[test]
    fn test_clear_cache_sees_new_content() {
        let mut file = fixture("old\n");
        let mut cache = LineCache::new(file.path());
        assert_eq!(cache.get_line(2).unwrap(), "");

        file.write_all(b"new\n").unwrap();
        file.flush().unwrap();
        cache.clear_cache();

        assert_eq!(cache.get_line(2).unwrap(), "new\n");
    }

    #[test]
    fn test_byte_order_mark_is_stripped() {
        let file = fixture("\u{feff}1, 2\n\u{feff}3\n");
        let mut cache = LineCache::new(file.path());

        assert_eq!(cache.get_line(1).unwrap(), "1, 2\n");
        // Only the start of the file carries a mark
        assert_eq!(cache.get_line(2).unwrap(), "\u{feff}3\n");
        assert_eq!(cache.get_line(1).unwrap(), "1, 2\n");
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = LineCache::new(dir.path().join("missing.csv"));
        assert!(!LineCache::exists(cache.path()));
        assert!(cache.get_line(1).is_err());
    }
}
