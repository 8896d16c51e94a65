//! Endpoint encryption and password hashing.
//!
//! Every record owns one random [`Seed`]. It is used as the AES-256-CBC
//! initialization vector for the endpoint and as the PBKDF2 salt for the
//! password, so a record never needs more than one stored secret besides the
//! ciphertext and the hash. The deployment key lives only inside [`UrlCrypto`].

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use std::fmt;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const KEY_LENGTH: usize = 32;
/// Matches the AES block size, so a seed is always a valid CBC IV.
pub const SEED_LENGTH: usize = 16;

const HASH_ITERATIONS: u32 = 10_000;
const HASH_LENGTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("seed must be 16 bytes, got {0}")]
    InvalidSeedLength(usize),
    #[error("malformed base64 data")]
    Encoding,
    #[error("ciphertext could not be decrypted")]
    Decryption,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Seed([u8; SEED_LENGTH]);

impl Seed {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }

    /// Text form stored in the `crypto_seed` column.
    pub fn encode(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    pub fn decode(text: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64_STANDARD
            .decode(text)
            .map_err(|_| CryptoError::Encoding)?;
        Self::try_from(bytes.as_slice())
    }
}

impl From<[u8; SEED_LENGTH]> for Seed {
    fn from(bytes: [u8; SEED_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Seed {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; SEED_LENGTH]>::try_from(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidSeedLength(bytes.len()))
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Holds the deployment-wide key. Construct it once at startup and share it
/// by reference.
pub struct UrlCrypto {
    key: [u8; KEY_LENGTH],
}

impl UrlCrypto {
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let key = <[u8; KEY_LENGTH]>::try_from(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { key })
    }

    pub fn from_base64(encoded_key: &str) -> Result<Self, CryptoError> {
        let key = BASE64_STANDARD
            .decode(encoded_key.trim())
            .map_err(|_| CryptoError::Encoding)?;
        Self::new(&key)
    }

    pub fn generate_seed(&self) -> Seed {
        Seed::generate()
    }

    /// Deterministic for a fixed `(plain_url, seed, key)`.
    pub fn encrypt_url(&self, plain_url: &str, seed: &Seed) -> String {
        let encrypted = Aes256CbcEnc::new(&self.key.into(), &seed.0.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plain_url.as_bytes());
        BASE64_STANDARD.encode(encrypted)
    }

    pub fn decrypt_url(&self, encrypted_url: &str, seed: &Seed) -> Result<String, CryptoError> {
        let encrypted = BASE64_STANDARD
            .decode(encrypted_url)
            .map_err(|_| CryptoError::Encoding)?;
        let decrypted = Aes256CbcDec::new(&self.key.into(), &seed.0.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
            .map_err(|_| CryptoError::Decryption)?;
        String::from_utf8(decrypted).map_err(|_| CryptoError::Decryption)
    }

    /// Decrypts using the text forms kept in storage.
    pub fn decrypt_stored(&self, encrypted_url: &str, encoded_seed: &str) -> Result<String, CryptoError> {
        let seed = Seed::decode(encoded_seed)?;
        self.decrypt_url(encrypted_url, &seed)
    }

    /// PBKDF2-HMAC-SHA512 of `password` salted with `salt`, base64 encoded.
    pub fn hash_password(&self, password: &str, salt: &Seed) -> String {
        let mut hash = [0u8; HASH_LENGTH];
        pbkdf2::pbkdf2_hmac::<Sha512>(password.as_bytes(), &salt.0, HASH_ITERATIONS, &mut hash);
        BASE64_STANDARD.encode(hash)
    }
}

impl fmt::Debug for UrlCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlCrypto").field("key", &"<redacted>").finish()
    }
}
