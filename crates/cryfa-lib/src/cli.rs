use std::path::PathBuf;

use crate::alphabet::BLOCK_SIZE;
use crate::crypto::KeyDerivation;

#[derive(Clone)]
pub struct CompressConfig {
    /// Input FASTA/FASTQ file
    pub input: PathBuf,
    /// Password file; its entire content is the password
    pub key_file: PathBuf,
    /// Directory for per-worker scratch files
    pub working_dir: PathBuf,
    /// Number of worker threads (≥ 1)
    pub threads: usize,
    /// Skip the password-keyed chunk shuffle
    pub disable_shuffle: bool,
    /// Key derivation scheme
    pub kdf: KeyDerivation,
    /// Chunk sizing parameter; tests shrink it to force multi-chunk runs
    pub block_size: usize,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            key_file: PathBuf::new(),
            working_dir: PathBuf::from("."),
            threads: 1,
            disable_shuffle: false,
            kdf: KeyDerivation::Legacy,
            block_size: BLOCK_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct DecompressConfig {
    /// Encrypted input blob
    pub input: PathBuf,
    /// Password file; must match the one used to encrypt
    pub key_file: PathBuf,
    /// Directory for per-worker scratch files
    pub working_dir: PathBuf,
    /// Number of worker threads; independent of the compress-side count
    pub threads: usize,
    /// Key derivation scheme; must match the one used to encrypt
    pub kdf: KeyDerivation,
}

impl Default for DecompressConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            key_file: PathBuf::new(),
            working_dir: PathBuf::from("."),
            threads: 1,
            kdf: KeyDerivation::Legacy,
        }
    }
}

pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}
