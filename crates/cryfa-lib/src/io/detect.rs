use anyhow::Result;
use std::path::Path;

use super::LineReader;

/// What the first non-empty line of the input says the file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Fasta,
    Fastq,
    Sam,
    Unknown,
}

/// SAM header record tags; a line like `@SQ\t...` is a SAM header, not a
/// FASTQ read id.
const SAM_TAGS: [&[u8; 2]; 5] = [b"HD", b"SQ", b"RG", b"PG", b"CO"];

/// Sniff the file type from the first non-empty line.
pub fn detect_file_kind(path: impl AsRef<Path>) -> Result<FileKind> {
    let mut reader = LineReader::open(path)?;
    let mut line = Vec::new();
    while reader.read_line(&mut line)? {
        if line.is_empty() {
            continue;
        }
        return Ok(match line[0] {
            b'>' => FileKind::Fasta,
            b'@' if looks_like_sam(&line) => FileKind::Sam,
            b'@' => FileKind::Fastq,
            _ => FileKind::Unknown,
        });
    }
    Ok(FileKind::Unknown)
}

fn looks_like_sam(line: &[u8]) -> bool {
    line.len() >= 4
        && line[3] == b'\t'
        && SAM_TAGS.iter().any(|tag| &line[1..3] == tag.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(content: &[u8]) -> FileKind {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe");
        std::fs::write(&path, content).unwrap();
        detect_file_kind(&path).unwrap()
    }

    #[test]
    fn detects_fasta() {
        assert_eq!(kind_of(b">chr1\nACGT\n"), FileKind::Fasta);
    }

    #[test]
    fn detects_fastq() {
        assert_eq!(kind_of(b"@read1\nACGT\n+\n!!!!\n"), FileKind::Fastq);
        // A read id that merely starts with a SAM-ish tag is still FASTQ
        assert_eq!(kind_of(b"@SQ1.44\nACGT\n+\n!!!!\n"), FileKind::Fastq);
    }

    #[test]
    fn detects_sam() {
        assert_eq!(kind_of(b"@HD\tVN:1.6\tSO:coordinate\n"), FileKind::Sam);
        assert_eq!(kind_of(b"@SQ\tSN:chr1\tLN:248956422\n"), FileKind::Sam);
    }

    #[test]
    fn neither_is_unknown() {
        assert_eq!(kind_of(b"hello world\n"), FileKind::Unknown);
        assert_eq!(kind_of(b""), FileKind::Unknown);
        assert_eq!(kind_of(b"\n\n\n"), FileKind::Unknown);
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        assert_eq!(kind_of(b"\n\n>seq\nACGT\n"), FileKind::Fasta);
    }
}
