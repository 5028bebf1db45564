//! The compaction-plus-encryption pipeline.
//!
//! Compression: alphabet scan → packer selection → striped workers →
//! merger → framer → cipher. Decompression mirrors it, driven by the
//! chunk-length envelopes so the two sides may use different worker
//! counts.

pub mod frame;

mod compress;
mod decompress;
mod scratch;

pub use compress::{compact, CompactOptions};
pub use decompress::{expand, ExpandOptions};

use anyhow::{bail, Context, Result};
use std::io::Write;
use tracing::info;

use crate::cli::{CompressConfig, DecompressConfig};
use crate::crypto;
use crate::pack::{DnaCodec, StreamCodec};
use crate::shuffle;
use frame::StreamHead;

/// Immutable per-run state shared read-only across workers: the stream
/// codecs, built once from the discovered (or transmitted) alphabets.
pub(crate) struct RunContext {
    pub fasta: bool,
    pub bare_plus: bool,
    pub header: StreamCodec,
    /// Empty-alphabet codec in FASTA mode; never consulted there.
    pub qscore: StreamCodec,
    pub dna: DnaCodec,
}

impl RunContext {
    pub(crate) fn from_head(head: &StreamHead) -> Self {
        Self {
            fasta: head.fasta,
            bare_plus: head.bare_plus,
            header: StreamCodec::new(&head.header_alphabet),
            qscore: StreamCodec::new(&head.qscore_alphabet),
            dna: DnaCodec::new(),
        }
    }
}

/// Compact and encrypt `config.input`, writing watermark + ciphertext.
pub fn compress(config: &CompressConfig, out: &mut dyn Write) -> Result<()> {
    let pass = crypto::read_password(&config.key_file)?;
    let opts = CompactOptions {
        threads: config.threads,
        shuffle_seed: (!config.disable_shuffle).then(|| shuffle::chunk_seed(&pass)),
        block_size: config.block_size,
        working_dir: config.working_dir.clone(),
    };
    let compact_stream = compact(&config.input, &opts)?;

    let (key, iv) = crypto::derive(&pass, config.kdf);
    let cipher = crypto::encrypt(&compact_stream, &key, &iv);
    out.write_all(frame::watermark().as_bytes())?;
    out.write_all(&cipher)?;
    out.flush()?;
    info!(
        compact = compact_stream.len(),
        cipher = cipher.len(),
        "encrypted output written"
    );
    Ok(())
}

/// Decrypt and expand `config.input`, writing the reconstructed file.
pub fn decompress(config: &DecompressConfig, out: &mut dyn Write) -> Result<()> {
    let pass = crypto::read_password(&config.key_file)?;
    let blob = std::fs::read(&config.input)
        .with_context(|| format!("failed to open {:?}", config.input))?;

    let watermark = frame::watermark();
    let Some(cipher) = blob.strip_prefix(watermark.as_bytes()) else {
        bail!("invalid encrypted file: missing {:?} watermark", watermark.trim_end());
    };

    let (key, iv) = crypto::derive(&pass, config.kdf);
    let compact_stream = crypto::decrypt(cipher, &key, &iv)?;
    info!(cipher = cipher.len(), compact = compact_stream.len(), "decrypted input");

    let opts = ExpandOptions {
        threads: config.threads,
        working_dir: config.working_dir.clone(),
        shuffle_seed: shuffle::chunk_seed(&pass),
    };
    expand(&compact_stream, &opts, out)
}
