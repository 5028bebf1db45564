//! Forward pipeline: striped workers pack line blocks into per-worker
//! scratch files; the merger splices them into one compact stream.

use anyhow::{bail, Result};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

use super::frame::{self, StreamHead, EMPTY_LINE, END_OF_STREAM, HEADER_MARK, LINE_END};
use super::scratch::{self, TmpCleanup};
use super::RunContext;
use crate::alphabet::{self, BLOCK_SIZE};
use crate::io::{detect_file_kind, FileKind, LineReader};
use crate::shuffle;

pub struct CompactOptions {
    /// Worker count T; each worker owns the stripe of line blocks congruent
    /// to its id mod T.
    pub threads: usize,
    /// Fisher-Yates seed, or `None` when shuffling is disabled.
    pub shuffle_seed: Option<u64>,
    /// Chunk sizing parameter (input bytes per chunk, roughly).
    pub block_size: usize,
    /// Directory for per-worker scratch files.
    pub working_dir: PathBuf,
}

impl Default for CompactOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            shuffle_seed: None,
            block_size: BLOCK_SIZE,
            working_dir: PathBuf::from("."),
        }
    }
}

/// Logs the shuffling diagnostic exactly once across all workers.
#[derive(Default)]
struct ShuffleDiag {
    noted: Mutex<bool>,
}

impl ShuffleDiag {
    fn note(&self) {
        if let Ok(mut noted) = self.noted.lock() {
            if !*noted {
                *noted = true;
                debug!("shuffling chunk payloads");
            }
        }
    }
}

/// Compact `input` into the self-describing pre-cipher stream.
pub fn compact(input: &Path, opts: &CompactOptions) -> Result<Vec<u8>> {
    let start = Instant::now();
    let threads = opts.threads.max(1);
    let (head, block_line) = survey(input, opts)?;
    let ctx = RunContext::from_head(&head);
    info!(
        fasta = head.fasta,
        threads, block_line, "compacting {:?}", input
    );

    let paths: Vec<PathBuf> = (0..threads)
        .map(|t| scratch::scratch_path(&opts.working_dir, "enc", t))
        .collect();
    let _cleanup = TmpCleanup(paths.clone());
    let diag = ShuffleDiag::default();

    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(threads);
        for (t, path) in paths.iter().enumerate() {
            let ctx = &ctx;
            let diag = &diag;
            handles.push(scope.spawn(move || {
                pack_stripe(
                    input,
                    path,
                    t,
                    threads as u64,
                    block_line,
                    ctx,
                    opts.shuffle_seed,
                    diag,
                )
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

    let mut context = Vec::new();
    frame::write_head(&head, &mut context);
    let mut chunks = 0usize;
    scratch::merge(&paths, |payload| {
        frame::write_envelope(payload.len(), &mut context);
        context.extend_from_slice(payload);
        context.push(b'\n');
        chunks += 1;
        Ok(())
    })?;
    context.push(END_OF_STREAM);

    info!(
        chunks,
        bytes = context.len(),
        "compaction done in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(context)
}

/// Sniff the input, scan its alphabets, and size the chunks.
fn survey(input: &Path, opts: &CompactOptions) -> Result<(StreamHead, u64)> {
    let shuffled = opts.shuffle_seed.is_some();
    match detect_file_kind(input)? {
        FileKind::Fasta => {
            let scan = alphabet::scan_fasta(input)?;
            let block_line = alphabet::fasta_block_line(opts.block_size, scan.max_seq_line);
            Ok((
                StreamHead {
                    fasta: true,
                    shuffled,
                    header_alphabet: scan.header_alphabet,
                    qscore_alphabet: Vec::new(),
                    bare_plus: false,
                },
                block_line,
            ))
        }
        FileKind::Fastq => {
            let scan = alphabet::scan_fastq(input)?;
            let block_line = alphabet::fastq_block_line(
                opts.block_size,
                scan.max_header_line,
                scan.max_qscore_line,
            );
            Ok((
                StreamHead {
                    fasta: false,
                    shuffled,
                    header_alphabet: scan.header_alphabet,
                    qscore_alphabet: scan.qscore_alphabet,
                    bare_plus: scan.bare_plus,
                },
                block_line,
            ))
        }
        FileKind::Sam => bail!("SAM input is not supported"),
        FileKind::Unknown => bail!("{input:?} is not a valid FASTA or FASTQ file"),
    }
}

/// One worker: pack every line block in this worker's stripe.
#[allow(clippy::too_many_arguments)]
fn pack_stripe(
    input: &Path,
    scratch_file: &Path,
    t: usize,
    threads: u64,
    block_line: u64,
    ctx: &RunContext,
    shuffle_seed: Option<u64>,
    diag: &ShuffleDiag,
) -> Result<()> {
    let mut reader = LineReader::open(input)?;
    let mut scratch = BufWriter::new(std::fs::File::create(scratch_file)?);

    let lead_in = t as u64 * block_line;
    if reader.skip_lines(lead_in)? < lead_in {
        return Ok(()); // stripe starts past EOF: this worker has no input
    }

    let mut payload = Vec::new();
    loop {
        payload.clear();
        let lines = if ctx.fasta {
            pack_fasta_block(ctx, &mut reader, block_line, &mut payload)?
        } else {
            pack_fastq_block(ctx, &mut reader, block_line, &mut payload)?
        };
        if lines == 0 {
            break;
        }
        if let Some(seed) = shuffle_seed {
            diag.note();
            shuffle::shuffle(&mut payload, seed);
        }
        scratch::write_chunk(&mut scratch, t, &payload)?;
        if lines < block_line {
            break; // final, short chunk
        }
        let stride = (threads - 1) * block_line;
        if reader.skip_lines(stride)? < stride {
            break;
        }
    }
    scratch.flush()?;
    Ok(())
}

fn pack_fasta_block(
    ctx: &RunContext,
    reader: &mut LineReader,
    block_line: u64,
    out: &mut Vec<u8>,
) -> Result<u64> {
    let mut line = Vec::new();
    let mut read = 0;
    while read < block_line {
        if !reader.read_line(&mut line)? {
            break;
        }
        read += 1;
        if line.first() == Some(&b'>') {
            out.push(HEADER_MARK);
            ctx.header.pack_line(&line[1..], out)?;
            out.push(LINE_END);
        } else if line.is_empty() {
            out.push(EMPTY_LINE);
        } else {
            ctx.dna.pack_line(&line, out);
            out.push(LINE_END);
        }
    }
    Ok(read)
}

fn pack_fastq_block(
    ctx: &RunContext,
    reader: &mut LineReader,
    block_line: u64,
    out: &mut Vec<u8>,
) -> Result<u64> {
    let mut header = Vec::new();
    let mut line = Vec::new();
    let mut read = 0;
    while read < block_line {
        if !reader.read_line(&mut header)? {
            break;
        }
        if header.first() != Some(&b'@') {
            bail!("malformed FASTQ record: header does not start with '@'");
        }
        ctx.header.pack_line(&header[1..], out)?;
        out.push(LINE_END);

        if !reader.read_line(&mut line)? {
            bail!("truncated FASTQ record: missing sequence line");
        }
        ctx.dna.pack_line(&line, out);
        out.push(LINE_END);

        // '+' separator carries no information beyond the head's flag
        if reader.skip_lines(1)? != 1 {
            bail!("truncated FASTQ record: missing '+' line");
        }

        if !reader.read_line(&mut line)? {
            bail!("truncated FASTQ record: missing quality line");
        }
        ctx.qscore.pack_line(&line, out)?;
        out.push(LINE_END);
        read += 4;
    }
    Ok(read)
}
