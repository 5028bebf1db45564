mod detect;

pub use detect::{detect_file_kind, FileKind};

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Buffered line reader over a plain text file.
///
/// Lines are read as raw bytes (`read_until` avoids the UTF-8 validation
/// overhead of `read_line`); only the trailing `\n` is stripped, so `\r`
/// survives as line content and round-trips untouched.
pub struct LineReader {
    reader: BufReader<std::fs::File>,
    scratch: Vec<u8>,
}

impl LineReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("failed to open {:?}", path.as_ref()))?;
        Ok(Self {
            reader: BufReader::with_capacity(1 << 20, file),
            scratch: Vec::with_capacity(512),
        })
    }

    /// Read the next line into `buf` (without its `\n`). Returns false at EOF.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();
        let n = self.reader.read_until(b'\n', buf)?;
        if n == 0 {
            return Ok(false);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(true)
    }

    /// Skip up to `n` lines; returns how many were actually consumed.
    pub fn skip_lines(&mut self, n: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < n {
            self.scratch.clear();
            if self.reader.read_until(b'\n', &mut self.scratch)? == 0 {
                break;
            }
            skipped += 1;
        }
        Ok(skipped)
    }
}
