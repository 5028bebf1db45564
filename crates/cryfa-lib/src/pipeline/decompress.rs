//! Inverse pipeline: walk the chunk envelopes, dispatch chunks to workers
//! round-robin, decode into scratch files, merge back into the original
//! text. The worker count here is independent of the one used to compress;
//! the length envelopes carry everything needed to repartition.

use anyhow::{bail, Result};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use super::frame::{self, EMPTY_LINE, HEADER_MARK};
use super::scratch::{self, TmpCleanup};
use super::RunContext;
use crate::shuffle;

pub struct ExpandOptions {
    /// Worker count; need not match the count used during compression.
    pub threads: usize,
    /// Directory for per-worker scratch files.
    pub working_dir: PathBuf,
    /// Password-derived Fisher-Yates seed; only consulted when the stream
    /// head says its chunks were shuffled.
    pub shuffle_seed: u64,
}

/// Expand a decrypted compact stream back into the original file bytes.
pub fn expand(stream: &[u8], opts: &ExpandOptions, out: &mut dyn Write) -> Result<()> {
    let start = Instant::now();
    let threads = opts.threads.max(1);

    let mut pos = 0usize;
    let head = frame::read_head(stream, &mut pos)?;
    let ctx = RunContext::from_head(&head);
    info!(
        fasta = head.fasta,
        shuffled = head.shuffled,
        threads,
        "expanding compact stream"
    );

    // Walk the envelopes, assigning chunk j·T+t to worker t.
    let mut stripes: Vec<Vec<&[u8]>> = vec![Vec::new(); threads];
    'rounds: loop {
        for stripe in stripes.iter_mut() {
            let Some(len) = frame::read_envelope(stream, &mut pos)? else {
                break 'rounds;
            };
            let Some(payload) = pos.checked_add(len).and_then(|end| stream.get(pos..end)) else {
                bail!("corrupt stream: chunk shorter than its envelope");
            };
            pos += len;
            if stream.get(pos) != Some(&b'\n') {
                bail!("corrupt stream: chunk is missing its trailing newline");
            }
            pos += 1;
            stripe.push(payload);
        }
    }
    if pos != stream.len() {
        bail!("corrupt stream: trailing bytes after the end-of-stream sentinel");
    }
    let chunks: usize = stripes.iter().map(Vec::len).sum();

    let paths: Vec<PathBuf> = (0..threads)
        .map(|t| scratch::scratch_path(&opts.working_dir, "dec", t))
        .collect();
    let _cleanup = TmpCleanup(paths.clone());

    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(threads);
        for (t, (path, stripe)) in paths.iter().zip(&stripes).enumerate() {
            let ctx = &ctx;
            let shuffled = head.shuffled;
            let seed = opts.shuffle_seed;
            handles.push(scope.spawn(move || -> Result<()> {
                let mut scratch = BufWriter::new(std::fs::File::create(path)?);
                let mut text = Vec::new();
                for payload in stripe {
                    text.clear();
                    if shuffled {
                        let mut payload = payload.to_vec();
                        shuffle::unshuffle(&mut payload, seed);
                        expand_chunk(ctx, &payload, &mut text)?;
                    } else {
                        expand_chunk(ctx, payload, &mut text)?;
                    }
                    scratch::write_chunk(&mut scratch, t, &text)?;
                }
                scratch.flush()?;
                Ok(())
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(())
    })?;

    let mut written = 0usize;
    scratch::merge(&paths, |text| {
        written += text.len();
        out.write_all(text)?;
        Ok(())
    })?;
    out.flush()?;

    info!(
        chunks,
        bytes = written,
        "expansion done in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn expand_chunk(ctx: &RunContext, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    if ctx.fasta {
        expand_fasta_chunk(ctx, payload, out)
    } else {
        expand_fastq_chunk(ctx, payload, out)
    }
}

/// FASTA chunks interleave header, sequence and empty-line records; the
/// leading byte of each record tells them apart.
fn expand_fasta_chunk(ctx: &RunContext, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut pos = 0usize;
    while pos < payload.len() {
        match payload[pos] {
            HEADER_MARK => {
                pos += 1;
                out.push(b'>');
                ctx.header.unpack_line(payload, &mut pos, out)?;
                out.push(b'\n');
            }
            EMPTY_LINE => {
                pos += 1;
                out.push(b'\n');
            }
            _ => {
                ctx.dna.unpack_line(payload, &mut pos, out)?;
                out.push(b'\n');
            }
        }
    }
    Ok(())
}

/// FASTQ chunks hold whole records: header, sequence, quality. The `+`
/// line is rebuilt from the head's flag, repeating the header when the
/// input annotated its separators.
fn expand_fastq_chunk(ctx: &RunContext, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut pos = 0usize;
    while pos < payload.len() {
        out.push(b'@');
        let header_start = out.len();
        ctx.header.unpack_line(payload, &mut pos, out)?;
        let header_end = out.len();
        out.push(b'\n');

        ctx.dna.unpack_line(payload, &mut pos, out)?;
        out.push(b'\n');

        out.push(b'+');
        if !ctx.bare_plus {
            let header = out[header_start..header_end].to_vec();
            out.extend_from_slice(&header);
        }
        out.push(b'\n');

        ctx.qscore.unpack_line(payload, &mut pos, out)?;
        out.push(b'\n');
    }
    Ok(())
}
