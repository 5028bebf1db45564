//! cryfa: FASTA/FASTQ compaction plus encryption.
//!
//! The compactor exploits the small alphabets of the three symbol streams
//! in sequence files (bases, headers, quality scores) to pack several
//! input characters per output byte, then seals the result with
//! AES-128-CBC. The packed stream is framed with self-describing chunk
//! envelopes, so decompression may run with a different worker count than
//! compression and still reproduce the input byte for byte.

pub mod alphabet;
pub mod cli;
pub mod crypto;
pub mod io;
pub mod pack;
pub mod pipeline;
pub mod shuffle;

pub use cli::{CompressConfig, DecompressConfig};
pub use crypto::KeyDerivation;
pub use io::FileKind;
pub use pipeline::{compress, decompress};
