//! Code tables: fixed-length keys over a working alphabet, enumerated in
//! lexicographic order, each assigned its ordinal as the packed code.

use rustc_hash::FxHashMap;

pub struct PackTables {
    key_len: usize,
    forward: FxHashMap<Vec<u8>, u16>,
    /// Inverse table, flat with stride `key_len`, indexed by code.
    inverse: Vec<u8>,
}

impl PackTables {
    /// Enumerate all `alphabet.len() ^ key_len` keys. The largest instance
    /// (40 symbols, key length 3) is 64 000 entries.
    pub fn build(alphabet: &[u8], key_len: usize) -> Self {
        let n = alphabet.len();
        let entries = n.pow(key_len as u32);
        let mut forward =
            FxHashMap::with_capacity_and_hasher(entries, Default::default());
        let mut inverse = Vec::with_capacity(entries * key_len);

        // Odometer over alphabet indices, most significant position first.
        let mut digits = vec![0usize; key_len];
        for code in 0..entries {
            let key: Vec<u8> = digits.iter().map(|&d| alphabet[d]).collect();
            inverse.extend_from_slice(&key);
            forward.insert(key, code as u16);
            for pos in (0..key_len).rev() {
                digits[pos] += 1;
                if digits[pos] < n {
                    break;
                }
                digits[pos] = 0;
            }
        }

        Self {
            key_len,
            forward,
            inverse,
        }
    }

    pub fn code_of(&self, key: &[u8]) -> Option<u16> {
        self.forward.get(key).copied()
    }

    pub fn key_of(&self, code: u16) -> Option<&[u8]> {
        let start = code as usize * self.key_len;
        self.inverse.get(start..start + self.key_len)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
