use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use cryfa_lib::cli::{num_cpus, CompressConfig, DecompressConfig};
use cryfa_lib::KeyDerivation;

#[derive(Parser)]
#[command(name = "cryfa")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "FASTA/FASTQ compaction plus encryption", long_about = None)]
struct Cli {
    /// Password file; its entire content is the password (min 8 bytes)
    #[arg(short = 'k', long = "key", value_name = "FILE")]
    key: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 't', long = "thread", value_name = "N", default_value_t = num_cpus())]
    thread: usize,

    /// Decrypt and decompress (default: compress and encrypt)
    #[arg(short = 'd', long = "decrypt")]
    decrypt: bool,

    /// Disable the password-keyed chunk shuffle
    #[arg(short = 's', long = "disable_shuffle")]
    disable_shuffle: bool,

    /// Diagnostic logs on stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Show program information and exit
    #[arg(short = 'a', long = "about")]
    about: bool,

    /// Directory for temporary scratch files
    #[arg(long = "working-dir", value_name = "DIR", default_value = ".")]
    working_dir: PathBuf,

    /// Key derivation scheme (must match between encrypt and decrypt)
    #[arg(long = "kdf", value_enum, default_value = "legacy")]
    kdf: CliKdf,

    /// Input file (FASTA/FASTQ to encrypt, or an encrypted blob with -d)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliKdf {
    /// Historical two-stage LCG derivation
    Legacy,
    /// PBKDF2-HMAC-SHA256
    Pbkdf2,
}

impl From<CliKdf> for KeyDerivation {
    fn from(kdf: CliKdf) -> Self {
        match kdf {
            CliKdf::Legacy => KeyDerivation::Legacy,
            CliKdf::Pbkdf2 => KeyDerivation::Pbkdf2,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "info" })
            }),
        )
        .init();

    if cli.about {
        println!("cryfa v{} - FASTA/FASTQ compaction plus encryption", env!("CARGO_PKG_VERSION"));
        println!("Packs sequence, header and quality streams into a fraction");
        println!("of their size, then encrypts the result with AES-128-CBC.");
        return Ok(());
    }

    let key_file = cli.key.context("no password file has been set (use -k <FILE>)")?;
    let input = cli.input.context("missing input file")?;
    anyhow::ensure!(cli.thread >= 1, "thread count must be at least 1");

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cli.decrypt {
        info!("decrypting and decompressing {:?}", input);
        let config = DecompressConfig {
            input,
            key_file,
            working_dir: cli.working_dir,
            threads: cli.thread,
            kdf: cli.kdf.into(),
        };
        cryfa_lib::decompress(&config, &mut out)?;
    } else {
        info!("compacting and encrypting {:?}", input);
        let config = CompressConfig {
            input,
            key_file,
            working_dir: cli.working_dir,
            threads: cli.thread,
            disable_shuffle: cli.disable_shuffle,
            kdf: cli.kdf.into(),
            ..CompressConfig::default()
        };
        cryfa_lib::compress(&config, &mut out)?;
    }
    out.flush()?;
    Ok(())
}
