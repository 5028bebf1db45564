//! One-pass alphabet discovery and chunk sizing.
//!
//! The packers are sized from what the input actually contains: the set of
//! distinct bytes on header lines and (for FASTQ) quality lines, plus the
//! longest line of each stream. Alphabets are sorted ascending so that both
//! directions enumerate identical code tables.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::debug;

use crate::io::LineReader;

/// Hard cap on discovered alphabet size; the printable ASCII range has 95
/// characters, so anything larger indicates a malformed input stream.
pub const MAX_ALPHABET: usize = 95;

/// Target packed-chunk size in input bytes; one chunk covers roughly this
/// much source text. Sizing functions take it as a parameter so tests can
/// shrink it to force multi-chunk pipelines.
pub const BLOCK_SIZE: usize = 1 << 18;

/// Distinct-byte accumulator over one symbol stream.
struct ByteSet {
    seen: [bool; 256],
}

impl Default for ByteSet {
    fn default() -> Self {
        ByteSet { seen: [false; 256] }
    }
}

impl ByteSet {
    fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.seen[b as usize] = true;
        }
    }

    /// Sorted alphabet; members must be printable ASCII (32-126), which
    /// also keeps every discovered byte clear of the reserved sentinel
    /// range.
    fn into_sorted(self, stream: &str) -> Result<Vec<u8>> {
        let alphabet: Vec<u8> = (0u16..=255)
            .filter(|&b| self.seen[b as usize])
            .map(|b| b as u8)
            .collect();
        if let Some(&bad) = alphabet.iter().find(|&&b| !(32..=126).contains(&b)) {
            bail!("{stream} contains non-printable byte {bad:#04x}");
        }
        if alphabet.len() > MAX_ALPHABET {
            bail!(
                "{stream} alphabet has {} distinct characters (max {MAX_ALPHABET})",
                alphabet.len()
            );
        }
        Ok(alphabet)
    }
}

/// Scan result for a FASTA input.
pub struct FastaSummary {
    /// Distinct bytes on header lines, `>` excluded, sorted ascending.
    pub header_alphabet: Vec<u8>,
    /// Longest sequence line in bytes.
    pub max_seq_line: usize,
}

/// Scan result for a FASTQ input.
pub struct FastqSummary {
    /// Distinct bytes on header lines, `@` excluded, sorted ascending.
    pub header_alphabet: Vec<u8>,
    /// Distinct bytes on quality lines, sorted ascending.
    pub qscore_alphabet: Vec<u8>,
    pub max_header_line: usize,
    pub max_qscore_line: usize,
    /// True iff every separator line is exactly `+`.
    pub bare_plus: bool,
}

pub fn scan_fasta(path: impl AsRef<Path>) -> Result<FastaSummary> {
    let mut reader = LineReader::open(path)?;
    let mut line = Vec::new();
    let mut headers = ByteSet::default();
    let mut max_seq_line = 0usize;

    while reader.read_line(&mut line)? {
        if line.first() == Some(&b'>') {
            headers.extend(&line[1..]);
        } else if !line.is_empty() {
            if line.contains(&b' ') {
                bail!("invalid sequence -- spaces not allowed");
            }
            max_seq_line = max_seq_line.max(line.len());
        }
    }

    let header_alphabet = headers.into_sorted("header")?;
    debug!(
        header_alphabet = header_alphabet.len(),
        max_seq_line, "scanned FASTA input"
    );
    Ok(FastaSummary {
        header_alphabet,
        max_seq_line,
    })
}

pub fn scan_fastq(path: impl AsRef<Path>) -> Result<FastqSummary> {
    let mut reader = LineReader::open(path)?;
    let mut header = Vec::new();
    let mut line = Vec::new();
    let mut headers = ByteSet::default();
    let mut qscores = ByteSet::default();
    let mut max_header_line = 0usize;
    let mut max_qscore_line = 0usize;
    let mut bare_plus: Option<bool> = None;
    let mut records = 0u64;

    while reader.read_line(&mut header)? {
        if header.first() != Some(&b'@') {
            bail!("record {}: header does not start with '@'", records + 1);
        }
        headers.extend(&header[1..]);
        max_header_line = max_header_line.max(header.len() - 1);

        if !reader.read_line(&mut line)? {
            bail!("truncated FASTQ record: missing sequence line");
        }
        if line.contains(&b' ') {
            bail!("invalid sequence -- spaces not allowed");
        }

        if !reader.read_line(&mut line)? {
            bail!("truncated FASTQ record: missing '+' line");
        }
        // One global flag describes every separator; a line that is neither
        // '+' nor '+' followed by the header text cannot be rebuilt.
        let this_bare = line == b"+";
        if !this_bare && (line.first() != Some(&b'+') || line[1..] != header[1..]) {
            bail!(
                "record {}: '+' line is neither '+' nor a header repeat",
                records + 1
            );
        }
        match bare_plus {
            None => bare_plus = Some(this_bare),
            Some(prev) if prev != this_bare => {
                bail!("mixed bare and annotated '+' lines are not supported")
            }
            Some(_) => {}
        }

        if !reader.read_line(&mut line)? {
            bail!("truncated FASTQ record: missing quality line");
        }
        qscores.extend(&line);
        max_qscore_line = max_qscore_line.max(line.len());
        records += 1;
    }

    let header_alphabet = headers.into_sorted("header")?;
    let qscore_alphabet = qscores.into_sorted("quality score")?;
    debug!(
        records,
        header_alphabet = header_alphabet.len(),
        qscore_alphabet = qscore_alphabet.len(),
        "scanned FASTQ input"
    );
    Ok(FastqSummary {
        header_alphabet,
        qscore_alphabet,
        max_header_line,
        max_qscore_line,
        bare_plus: bare_plus.unwrap_or(true),
    })
}

/// Lines per chunk for FASTA: at least one header/sequence pair.
pub fn fasta_block_line(block_size: usize, max_seq_line: usize) -> u64 {
    ((block_size / max_seq_line.max(1)) as u64).max(2)
}

/// Lines per chunk for FASTQ: whole 4-line records only.
pub fn fastq_block_line(block_size: usize, max_header_line: usize, max_qscore_line: usize) -> u64 {
    let per_record = (max_header_line + 2 * max_qscore_line).max(1);
    (4 * (block_size / per_record) as u64).max(4)
}
