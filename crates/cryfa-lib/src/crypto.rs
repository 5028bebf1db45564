//! Cipher boundary: password handling, key/IV derivation, AES-128-CBC.
//!
//! The legacy derivation reproduces the historical construction: a first
//! LCG seeded from a couple of password bytes drives a password-weighted
//! accumulator, which seeds a second LCG that emits the key material with
//! its `% 255` bias intact. It is deliberately not a KDF; `--kdf pbkdf2`
//! selects the modern path.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use anyhow::{bail, Context, Result};
use std::path::Path;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;
const MIN_PASSWORD: usize = 8;

/// PBKDF2 parameters for the opt-in modern derivation.
const PBKDF2_SALT: &[u8] = b"cryfa.kdf.v1";
const PBKDF2_ROUNDS: u32 = 210_000;

/// minstd_rand0: x ← 16807·x mod (2³¹−1). The historical code leaned on
/// the C library's `rand()`; this pins the generator down explicitly so
/// both directions agree on every platform.
pub struct Lcg(u32);

impl Lcg {
    const MODULUS: u64 = 2_147_483_647;

    pub fn new(seed: u64) -> Self {
        let folded = (seed % Self::MODULUS) as u32;
        Self(if folded == 0 { 1 } else { folded })
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = (u64::from(self.0) * 16807 % Self::MODULUS) as u32;
        self.0
    }
}

/// How key and IV are produced from the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDerivation {
    /// Two-stage LCG mix with the historical constants and `% 255` bias.
    #[default]
    Legacy,
    /// PBKDF2-HMAC-SHA256 over a fixed salt.
    Pbkdf2,
}

/// Read the password: the entire content of the key file.
pub fn read_password(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let pass = std::fs::read(path.as_ref())
        .with_context(|| format!("failed to open key file {:?}", path.as_ref()))?;
    if pass.is_empty() {
        bail!("key file {:?} is empty", path.as_ref());
    }
    if pass.len() < MIN_PASSWORD {
        bail!("password must be at least {MIN_PASSWORD} bytes");
    }
    Ok(pass)
}

/// Derive (key, iv) for the cipher.
pub fn derive(pass: &[u8], kdf: KeyDerivation) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    debug_assert!(pass.len() >= MIN_PASSWORD);
    match kdf {
        KeyDerivation::Legacy => {
            let key_seed = 24_593 * u64::from(pass[0]) * u64::from(pass[2]) + 49_157;
            let iv_seed = 7_919 * u64::from(pass[2]) * u64::from(pass[5]) + 75_653;
            (legacy_fill(pass, key_seed), legacy_fill(pass, iv_seed))
        }
        KeyDerivation::Pbkdf2 => {
            let mut okm = [0u8; KEY_LEN + IV_LEN];
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(pass, PBKDF2_SALT, PBKDF2_ROUNDS, &mut okm);
            let mut key = [0u8; KEY_LEN];
            let mut iv = [0u8; IV_LEN];
            key.copy_from_slice(&okm[..KEY_LEN]);
            iv.copy_from_slice(&okm[KEY_LEN..]);
            (key, iv)
        }
    }
}

fn legacy_fill(pass: &[u8], seed: u64) -> [u8; 16] {
    let mut mixer = Lcg::new(seed);
    let mut acc: u64 = 0;
    for i in (0..pass.len()).rev() {
        let (r1, r2) = (mixer.next_u32(), mixer.next_u32());
        acc = acc
            .wrapping_add(u64::from(pass[i]).wrapping_mul(u64::from(r1)))
            .wrapping_add(u64::from(r2));
    }
    acc %= 4_294_967_295;

    let mut rng = Lcg::new(acc);
    let mut out = [0u8; 16];
    for i in (0..out.len()).rev() {
        // `% 255` reproduced verbatim: bytes land in 0..=254.
        out[i] = (rng.next_u32() % 256 % 255) as u8;
    }
    out
}

pub fn encrypt(plain: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plain)
}

pub fn decrypt(cipher: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    if cipher.is_empty() || cipher.len() % 16 != 0 {
        bail!("ciphertext length {} is not a multiple of the block size", cipher.len());
    }
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(cipher)
        .map_err(|_| anyhow::anyhow!("decryption failed: wrong password or corrupt input"))
}
