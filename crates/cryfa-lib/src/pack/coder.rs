//! Variable-ratio packers for header and quality-score lines.

use anyhow::{bail, Result};

use super::table::PackTables;
use super::{Category, MAX_SMALL_ALPHABET};
use crate::pipeline::frame::{ESCAPE, LINE_END};

/// Packer for one symbol stream, built once per run from its discovered
/// alphabet and shared read-only across workers.
pub struct StreamCodec {
    category: Category,
    tables: PackTables,
    /// Membership of the kept alphabet window (all of it for small
    /// alphabets, the last 39 characters for large ones).
    member: [bool; 256],
    /// Extension symbol for the large family: one past the largest kept
    /// character, so it can never be a member itself.
    x_sym: Option<u8>,
}

impl StreamCodec {
    pub fn new(alphabet: &[u8]) -> Self {
        let category = Category::for_alphabet_len(alphabet.len());
        let (kept, x_sym) = if category == Category::C3to2Large {
            let kept = &alphabet[alphabet.len() - MAX_SMALL_ALPHABET..];
            (kept, Some(kept[MAX_SMALL_ALPHABET - 1] + 1))
        } else {
            (alphabet, None)
        };

        let mut working = kept.to_vec();
        if let Some(x) = x_sym {
            working.push(x);
        }
        let tables = PackTables::build(&working, category.key_len());

        let mut member = [false; 256];
        for &b in kept {
            member[b as usize] = true;
        }

        Self {
            category,
            tables,
            member,
            x_sym,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Pack one source line. Full k-tuples become table codes (two-byte
    /// codes big-endian, keeping the leading byte clear of the sentinel
    /// range); the `len % k` remainder escapes one character at a time as
    /// `255` + literal. Large-family tuples substitute the extension symbol
    /// for out-of-window characters and queue their literals directly after
    /// the code.
    pub fn pack_line(&self, line: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let k = self.category.key_len();
        let width = self.category.code_width();
        let mut tuple = Vec::with_capacity(k);
        let mut literals: Vec<u8> = Vec::new();

        let whole = line.len() - line.len() % k;
        for chunk in line[..whole].chunks_exact(k) {
            tuple.clear();
            literals.clear();
            for &b in chunk {
                if self.member[b as usize] {
                    tuple.push(b);
                } else if let Some(x) = self.x_sym {
                    tuple.push(x);
                    literals.push(b);
                } else {
                    bail!("symbol {b:#04x} outside the discovered alphabet");
                }
            }
            let Some(code) = self.tables.code_of(&tuple) else {
                bail!("symbol tuple outside the discovered alphabet");
            };
            if width == 2 {
                out.push((code >> 8) as u8);
                out.push((code & 0xFF) as u8);
            } else {
                out.push(code as u8);
            }
            out.extend_from_slice(&literals);
        }
        for &b in &line[whole..] {
            out.push(ESCAPE);
            out.push(b);
        }
        Ok(())
    }

    /// Decode one line from `payload`, advancing `pos` past the terminating
    /// 254 sentinel. Only the leading byte of a two-byte code is sentinel
    /// checked; the trailing byte is consumed blindly.
    pub fn unpack_line(&self, payload: &[u8], pos: &mut usize, out: &mut Vec<u8>) -> Result<()> {
        let width = self.category.code_width();
        loop {
            let Some(&b) = payload.get(*pos) else {
                bail!("truncated chunk: unterminated line");
            };
            match b {
                LINE_END => {
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
                _ => {
                    let code = if width == 2 {
                        let Some(&lo) = payload.get(*pos + 1) else {
                            bail!("truncated chunk: split code");
                        };
                        *pos += 2;
                        u16::from(b) << 8 | u16::from(lo)
                    } else {
                        *pos += 1;
                        u16::from(b)
                    };
                    let Some(key) = self.tables.key_of(code) else {
                        bail!("corrupt chunk: code {code} outside the table");
                    };
                    for i in 0..key.len() {
                        let sym = key[i];
                        if Some(sym) == self.x_sym {
                            let Some(&lit) = payload.get(*pos) else {
                                bail!("truncated chunk: missing extension literal");
                            };
                            out.push(lit);
                            *pos += 1;
                        } else {
                            out.push(sym);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(alphabet: &[u8], line: &[u8]) -> Vec<u8> {
        let codec = StreamCodec::new(alphabet);
        let mut packed = Vec::new();
        codec.pack_line(line, &mut packed).unwrap();
        packed.push(LINE_END);
        let mut pos = 0;
        let mut out = Vec::new();
        codec.unpack_line(&packed, &mut pos, &mut out).unwrap();
        assert_eq!(pos, packed.len(), "cursor must land on the sentinel end");
        assert_eq!(out, line);
        packed
    }

    #[test]
    fn identity_family() {
        let packed = roundtrip(b"r", b"rrr");
        assert_eq!(packed, vec![0, 0, 0, LINE_END]);
    }

    #[test]
    fn seven_to_one() {
        let codec = StreamCodec::new(b"01");
        assert_eq!(codec.category(), Category::C7to1);
        // 7 symbols collapse into a single byte
        let mut packed = Vec::new();
        codec.pack_line(b"0110100", &mut packed).unwrap();
        assert_eq!(packed.len(), 1);
        roundtrip(b"01", b"0110100");
        roundtrip(b"01", b"011010011");
    }

    #[test]
    fn remainder_escapes() {
        let codec = StreamCodec::new(b"ab");
        let mut packed = Vec::new();
        codec.pack_line(b"abababab", &mut packed).unwrap();
        // one full 7-tuple, then one escaped literal
        assert_eq!(packed.len(), 1 + 2);
        assert_eq!(packed[1], ESCAPE);
        assert_eq!(packed[2], b'b');
        roundtrip(b"ab", b"abababab");
    }

    #[test]
    fn every_small_family_roundtrips() {
        let cases: [(&[u8], Category); 5] = [
            (b"ab", Category::C7to1),
            (b"abc", Category::C5to1),
            (b"abcde", Category::C3to1),
            (b"abcdefgh", Category::C2to1),
            (b"abcdefghijklmnopqrst", Category::C3to2),
        ];
        for (alphabet, cat) in cases {
            let codec = StreamCodec::new(alphabet);
            assert_eq!(codec.category(), cat);
            roundtrip(alphabet, b"abcabcbbaa");
            roundtrip(alphabet, b"a");
            roundtrip(alphabet, b"");
        }
    }

    #[test]
    fn two_byte_codes_are_big_endian() {
        let alphabet: Vec<u8> = (b'!'..b'!' + 39).collect();
        let codec = StreamCodec::new(&alphabet);
        assert_eq!(codec.category(), Category::C3to2);
        let mut packed = Vec::new();
        let last = alphabet[38];
        codec.pack_line(&[last, last, last], &mut packed).unwrap();
        let code = 39u16 * 39 * 39 - 1;
        assert_eq!(packed, vec![(code >> 8) as u8, (code & 0xFF) as u8]);
        // leading byte of any code stays below the sentinel range
        assert!(packed[0] < 252);
    }

    #[test]
    fn large_family_escapes_out_of_window() {
        // 50 distinct characters: the first 11 fall outside the kept window
        let alphabet: Vec<u8> = (b'0'..b'0' + 50).collect();
        let codec = StreamCodec::new(&alphabet);
        assert_eq!(codec.category(), Category::C3to2Large);

        // all in window
        roundtrip(&alphabet, &[b'0' + 20, b'0' + 30, b'0' + 49]);
        // mixed: dropped characters travel as literals after the code
        let line = [b'0', b'0' + 40, b'0' + 2, b'0' + 45];
        let packed = roundtrip(&alphabet, &line);
        // 2 code bytes + 2 literals + escape pair for the remainder + sentinel
        assert_eq!(packed.len(), 2 + 2 + 2 + 1);
        // all out of window
        roundtrip(&alphabet, &[b'0', b'0' + 1, b'0' + 2]);
    }

    #[test]
    fn extension_symbol_is_not_a_member() {
        let alphabet: Vec<u8> = (b'0'..b'0' + 50).collect();
        let codec = StreamCodec::new(&alphabet);
        let x = codec.x_sym.unwrap();
        assert_eq!(x, alphabet[49] + 1);
        assert!(!codec.member[x as usize]);
    }

    #[test]
    fn empty_alphabet_packs_empty_lines() {
        let codec = StreamCodec::new(b"");
        let mut packed = Vec::new();
        codec.pack_line(b"", &mut packed).unwrap();
        assert!(packed.is_empty());
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let codec = StreamCodec::new(b"ab");
        let mut packed = Vec::new();
        assert!(codec.pack_line(b"abababz", &mut packed).is_err());
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let codec = StreamCodec::new(b"abcdefgh");
        let mut pos = 0;
        let mut out = Vec::new();
        assert!(codec.unpack_line(&[0u8], &mut pos, &mut out).is_err());
    }
}
