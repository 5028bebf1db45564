//! Password-keyed chunk shuffling.
//!
//! Every chunk is permuted with the same Fisher-Yates schedule, keyed from
//! the password alone, so compressing and decompressing workers agree on
//! the permutation without exchanging any state.

use crate::crypto::Lcg;

/// Derive the 64-bit shuffle seed from the password: an LCG seeded from the
/// password-byte product drives a password-weighted sum.
pub fn chunk_seed(pass: &[u8]) -> u64 {
    let product = pass
        .iter()
        .fold(1u64, |acc, &b| acc.wrapping_mul(u64::from(b)));
    let mut mixer = Lcg::new(20_543u64.wrapping_mul(product).wrapping_add(81_647));
    pass.iter().fold(0u64, |acc, &b| {
        acc.wrapping_add(u64::from(b).wrapping_mul(u64::from(mixer.next_u32())))
    })
}

/// Fisher-Yates permutation of the whole chunk payload.
pub fn shuffle(data: &mut [u8], seed: u64) {
    let mut rng = Lcg::new(seed);
    for i in (1..data.len()).rev() {
        let j = rng.next_u32() as usize % (i + 1);
        data.swap(i, j);
    }
}

/// Inverse permutation: replay the swap schedule backwards.
pub fn unshuffle(data: &mut [u8], seed: u64) {
    let mut rng = Lcg::new(seed);
    let swaps: Vec<(usize, usize)> = (1..data.len())
        .rev()
        .map(|i| (i, rng.next_u32() as usize % (i + 1)))
        .collect();
    for &(i, j) in swaps.iter().rev() {
        data.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unshuffle_inverts_shuffle() {
        for len in [0usize, 1, 2, 3, 17, 256, 4096] {
            let original: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
            let mut data = original.clone();
            shuffle(&mut data, 0xDEAD_BEEF_CAFE);
            unshuffle(&mut data, 0xDEAD_BEEF_CAFE);
            assert_eq!(data, original, "len {len}");
        }
    }

    #[test]
    fn shuffle_actually_permutes() {
        let original: Vec<u8> = (0u8..=255).collect();
        let mut data = original.clone();
        shuffle(&mut data, 42);
        assert_ne!(data, original);
        let mut sorted = data.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original);
    }

    #[test]
    fn seed_depends_on_password() {
        let a = chunk_seed(b"password1");
        let b = chunk_seed(b"password2");
        assert_ne!(a, b);
        assert_eq!(a, chunk_seed(b"password1"));
    }

    #[test]
    fn different_seeds_different_permutations() {
        let mut a: Vec<u8> = (0u8..64).collect();
        let mut b = a.clone();
        shuffle(&mut a, 1);
        shuffle(&mut b, 2);
        assert_ne!(a, b);
    }
}
