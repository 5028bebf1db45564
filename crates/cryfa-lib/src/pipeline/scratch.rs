//! Per-worker scratch files and the round-robin merger.
//!
//! Each worker appends framed chunks to its own scratch file:
//! `THR=<id>` marker line, then a length envelope, then the chunk bytes.
//! The merger recovers global chunk order by sweeping the workers
//! round-robin (worker 0 chunk 0, worker 1 chunk 0, …, worker 0 chunk 1,
//! …), stripping the markers as it goes.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use super::frame::{self, ENVELOPE_CLOSE, ENVELOPE_OPEN};

/// Marker line prefix delimiting chunks inside scratch files.
pub(super) const THR_MARK: &str = "THR=";

/// Removes scratch files on scope exit, error paths included.
pub(super) struct TmpCleanup(pub Vec<PathBuf>);

impl Drop for TmpCleanup {
    fn drop(&mut self) {
        for path in &self.0 {
            let _ = std::fs::remove_file(path);
        }
    }
}

pub(super) fn scratch_path(working_dir: &Path, direction: &str, t: usize) -> PathBuf {
    working_dir.join(format!(".cryfa_{direction}_{t}.tmp"))
}

/// Append one framed chunk to a worker's scratch file.
pub(super) fn write_chunk(out: &mut impl Write, t: usize, payload: &[u8]) -> Result<()> {
    let mut envelope = Vec::with_capacity(24);
    frame::write_envelope(payload.len(), &mut envelope);
    writeln!(out, "{THR_MARK}{t}")?;
    out.write_all(&envelope)?;
    out.write_all(payload)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Sequential reader over one worker's scratch file.
pub(super) struct ScratchReader {
    reader: BufReader<std::fs::File>,
    t: usize,
    done: bool,
}

impl ScratchReader {
    pub(super) fn open(path: &Path, t: usize) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open scratch file {path:?}"))?;
        Ok(Self {
            reader: BufReader::with_capacity(1 << 20, file),
            t,
            done: false,
        })
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.reader
            .read_exact(&mut b)
            .context("scratch file truncated")?;
        Ok(b[0])
    }

    /// Next chunk payload, or `None` once this worker's file is exhausted.
    pub(super) fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let mut marker = Vec::new();
        if self.reader.read_until(b'\n', &mut marker)? == 0 {
            self.done = true;
            return Ok(None);
        }
        if marker.last() == Some(&b'\n') {
            marker.pop();
        }
        let expected = format!("{THR_MARK}{}", self.t);
        if marker != expected.as_bytes() {
            bail!(
                "scratch file for worker {} contains a foreign marker {:?}",
                self.t,
                String::from_utf8_lossy(&marker)
            );
        }

        if self.read_byte()? != ENVELOPE_OPEN {
            bail!("scratch chunk is missing its length envelope");
        }
        let mut len = 0usize;
        loop {
            match self.read_byte()? {
                ENVELOPE_CLOSE => break,
                d @ b'0'..=b'9' => len = len * 10 + (d - b'0') as usize,
                bad => bail!("bad scratch envelope byte {bad:#04x}"),
            }
        }
        let mut payload = vec![0u8; len];
        self.reader
            .read_exact(&mut payload)
            .context("scratch chunk shorter than its envelope")?;
        if self.read_byte()? != b'\n' {
            bail!("scratch chunk is missing its trailing newline");
        }
        Ok(Some(payload))
    }
}

/// Round-robin merge: one chunk from every worker per round, in worker
/// order, until every scratch file is exhausted.
pub(super) fn merge(
    paths: &[PathBuf],
    mut sink: impl FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    let mut readers = paths
        .iter()
        .enumerate()
        .map(|(t, p)| ScratchReader::open(p, t))
        .collect::<Result<Vec<_>>>()?;
    loop {
        let mut progressed = false;
        for reader in &mut readers {
            if let Some(payload) = reader.next_chunk()? {
                progressed = true;
                sink(&payload)?;
            }
        }
        if !progressed {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufWriter;

    #[test]
    fn chunks_merge_in_round_robin_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3).map(|t| scratch_path(dir.path(), "enc", t)).collect();

        // worker 0: chunks 0, 3, 6; worker 1: 1, 4; worker 2: 2, 5
        let chunks_by_worker: [&[u8]; 3] = [b"\x00\x03\x06", b"\x01\x04", b"\x02\x05"];
        for (t, chunks) in chunks_by_worker.iter().enumerate() {
            let mut w = BufWriter::new(std::fs::File::create(&paths[t]).unwrap());
            for &c in chunks.iter() {
                write_chunk(&mut w, t, &[c, c]).unwrap();
            }
            w.into_inner().unwrap();
        }

        let mut order = Vec::new();
        merge(&paths, |payload| {
            assert_eq!(payload.len(), 2);
            order.push(payload[0]);
            Ok(())
        })
        .unwrap();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn empty_scratch_files_merge_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..2).map(|t| scratch_path(dir.path(), "enc", t)).collect();
        for p in &paths {
            std::fs::File::create(p).unwrap();
        }
        let mut calls = 0;
        merge(&paths, |_| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn payload_bytes_may_collide_with_markers() {
        // A payload spelling "THR=0" must not be mistaken for a marker.
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(dir.path(), "dec", 0);
        let mut w = BufWriter::new(std::fs::File::create(&path).unwrap());
        write_chunk(&mut w, 0, b"THR=0\n").unwrap();
        write_chunk(&mut w, 0, b"second").unwrap();
        w.into_inner().unwrap();

        let mut reader = ScratchReader::open(&path, 0).unwrap();
        assert_eq!(reader.next_chunk().unwrap().unwrap(), b"THR=0\n");
        assert_eq!(reader.next_chunk().unwrap().unwrap(), b"second");
        assert!(reader.next_chunk().unwrap().is_none());
    }

    #[test]
    fn cleanup_guard_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_path(dir.path(), "enc", 0);
        std::fs::write(&path, b"x").unwrap();
        {
            let _guard = TmpCleanup(vec![path.clone()]);
        }
        assert!(!path.exists());
    }
}
