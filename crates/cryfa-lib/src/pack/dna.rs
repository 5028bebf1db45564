//! Fixed 3→1 nucleotide codec.
//!
//! Sequence lines ride a fixed five-symbol alphabet (A, C, G, N, T); three
//! bases pack positionally into one byte. Anything else, such as IUPAC
//! ambiguity codes or lowercase soft masking, takes an extension slot in
//! the triple and travels as a literal byte right after the code.

use anyhow::{bail, Result};

use crate::pipeline::frame::{EMPTY_LINE, ESCAPE, LINE_END};

/// The fixed in-subset bases, in ASCII order.
pub const SEQ_ALPHABET: [u8; 5] = *b"ACGNT";

/// Extension marker inside unpack-table tuples. `X` is never an in-subset
/// base, so a tuple slot holding it always means "pull the next literal".
const X_MARK: u8 = b'X';

/// Number of distinct triple codes: each slot is one of five bases or the
/// extension marker.
const CODES: usize = 6 * 6 * 6;

pub struct DnaCodec {
    /// Base value 0..=4 for members, 5 for everything else.
    val: [u8; 256],
    /// Code → tuple of bases, `X` marking take-from-stream slots.
    unpack: [[u8; 3]; CODES],
}

impl Default for DnaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl DnaCodec {
    pub fn new() -> Self {
        let mut val = [5u8; 256];
        for (i, &b) in SEQ_ALPHABET.iter().enumerate() {
            val[b as usize] = i as u8;
        }
        let mut unpack = [[0u8; 3]; CODES];
        let sym = |v: usize| -> u8 {
            if v < 5 {
                SEQ_ALPHABET[v]
            } else {
                X_MARK
            }
        };
        for (code, tuple) in unpack.iter_mut().enumerate() {
            *tuple = [sym(code / 36), sym(code / 6 % 6), sym(code % 6)];
        }
        Self { val, unpack }
    }

    /// Pack one sequence line; the trailing `len % 3` bases escape as
    /// `255` + literal each.
    pub fn pack_line(&self, line: &[u8], out: &mut Vec<u8>) {
        let whole = line.len() - line.len() % 3;
        for chunk in line[..whole].chunks_exact(3) {
            let v = [
                self.val[chunk[0] as usize],
                self.val[chunk[1] as usize],
                self.val[chunk[2] as usize],
            ];
            out.push(36 * v[0] + 6 * v[1] + v[2]);
            for (i, &b) in chunk.iter().enumerate() {
                if v[i] == 5 {
                    out.push(b);
                }
            }
        }
        for &b in &line[whole..] {
            out.push(ESCAPE);
            out.push(b);
        }
    }

    /// Decode one sequence line, advancing `pos` past the terminator.
    /// Both 254 and 252 end a line (the two terminators the format has
    /// historically used interchangeably here).
    pub fn unpack_line(&self, payload: &[u8], pos: &mut usize, out: &mut Vec<u8>) -> Result<()> {
        loop {
            let Some(&b) = payload.get(*pos) else {
                bail!("truncated chunk: unterminated sequence line");
            };
            match b {
                LINE_END | EMPTY_LINE => {
                    *pos += 1;
                    return Ok(());
                }
                ESCAPE => {
                    let Some(&lit) = payload.get(*pos + 1) else {
                        bail!("truncated chunk: escape without literal");
                    };
                    out.push(lit);
                    *pos += 2;
                }
                code if (code as usize) < CODES => {
                    *pos += 1;
                    for sym in self.unpack[code as usize] {
                        if sym == X_MARK {
                            let Some(&lit) = payload.get(*pos) else {
                                bail!("truncated chunk: missing base literal");
                            };
                            out.push(lit);
                            *pos += 1;
                        } else {
                            out.push(sym);
                        }
                    }
                }
                bad => bail!("corrupt chunk: unexpected byte {bad:#04x} in sequence data"),
            }
        }
    }
}
