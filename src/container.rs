//! The locked container format
//!
//! Passwords are stretched with PBKDF2-HMAC-SHA256 (see [`crate::kdf`]) and
//! the plaintext is encrypted with AES-256 in CBC mode after PKCS#7 padding.
//!
//! The binary format is:
//! - salt: 16 bytes
//! - iv: 16 bytes
//! - ciphertext: variable length, a non-zero multiple of 16 bytes
//!
//! There is no header, version byte or MAC. A wrong password is only
//! detected through invalid padding, which is not guaranteed: a small share
//! of wrong keys decrypt to bytes that happen to end in valid padding.
//! Callers are expected to check the master credential before opening.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256Dec, Aes256Enc, Block};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use crate::kdf::{self, KEY_LEN, SALT_LEN};

/// Length of the CBC initialization vector in bytes
pub const IV_LEN: usize = 16;

/// AES block size in bytes
pub const BLOCK_LEN: usize = 16;

/// Bytes preceding the ciphertext
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN;

/// Borrowed view of a container split into its three fields.
#[derive(Debug, Clone, Copy)]
pub struct ContainerParts<'a> {
    pub salt: &'a [u8; SALT_LEN],
    pub iv: &'a [u8; IV_LEN],
    pub ciphertext: &'a [u8],
}

impl<'a> ContainerParts<'a> {
    /// Splits `container` into salt, iv and ciphertext, checking only the
    /// framing (length and block alignment), never the key.
    pub fn parse(container: &'a [u8]) -> Result<Self> {
        let Some((salt, rest)) = container.split_first_chunk::<SALT_LEN>() else {
            return Err(corrupt("input likely truncated while reading salt"));
        };
        let Some((iv, ciphertext)) = rest.split_first_chunk::<IV_LEN>() else {
            return Err(corrupt("input likely truncated while reading iv"));
        };
        if ciphertext.is_empty() {
            return Err(corrupt("container holds no ciphertext"));
        }
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(corrupt(format!(
                "ciphertext length {} is not a multiple of the block size",
                ciphertext.len()
            )));
        }
        Ok(Self {
            salt,
            iv,
            ciphertext,
        })
    }
}

/// Encrypt plaintext with a password using a random salt and iv
///
/// Returns the binary format: salt(16) + iv(16) + ciphertext(variable)
pub fn seal(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let salt = kdf::random_salt();

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    seal_with(password, plaintext, &salt, &iv)
}

/// Encrypt plaintext with a password using the provided salt and iv
///
/// This function is ONLY for generating reproducible output in tests.
/// Reusing a salt/iv pair across files leaks plaintext equality; always use
/// [`seal`] for real data.
pub fn seal_with(
    password: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>> {
    let (key, _) = kdf::derive_key(password, Some(*salt))?;

    let mut body = pad(plaintext);
    cbc_encrypt_in_place(&key, iv, &mut body);

    let mut output = Vec::with_capacity(HEADER_LEN + body.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(iv);
    output.extend_from_slice(&body);
    Ok(output)
}

/// Decrypt a container with a password
pub fn open(password: &[u8], container: &[u8]) -> Result<Vec<u8>> {
    let parts = ContainerParts::parse(container)?;
    let (key, _) = kdf::derive_key(password, Some(*parts.salt))?;

    let mut body = parts.ciphertext.to_vec();
    cbc_decrypt_in_place(&key, parts.iv, &mut body);
    strip_padding(&mut body)?;
    Ok(body)
}

/// PKCS#7: always appends between 1 and 16 bytes, each holding the count.
pub(crate) fn pad(plaintext: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
    let mut padded = Vec::with_capacity(plaintext.len() + pad_len);
    padded.extend_from_slice(plaintext);
    padded.resize(plaintext.len() + pad_len, pad_len as u8);
    padded
}

pub(crate) fn strip_padding(buf: &mut Vec<u8>) -> Result<()> {
    let Some(&last) = buf.last() else {
        return Err(bad_padding());
    };
    let pad_len = usize::from(last);
    if pad_len == 0 || pad_len > BLOCK_LEN || pad_len > buf.len() {
        return Err(bad_padding());
    }
    let body_len = buf.len() - pad_len;
    if buf[body_len..].iter().any(|&b| b != last) {
        return Err(bad_padding());
    }
    buf.truncate(body_len);
    Ok(())
}

fn cbc_encrypt_in_place(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], buf: &mut [u8]) {
    let cipher = Aes256Enc::new(key.into());
    let mut prev = *iv;
    for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
        xor_in_place(chunk, &prev);
        cipher.encrypt_block(Block::from_mut_slice(chunk));
        prev.copy_from_slice(chunk);
    }
}

fn cbc_decrypt_in_place(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], buf: &mut [u8]) {
    let cipher = Aes256Dec::new(key.into());
    let mut prev = *iv;
    for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
        let mut current = [0u8; BLOCK_LEN];
        current.copy_from_slice(chunk);
        cipher.decrypt_block(Block::from_mut_slice(chunk));
        xor_in_place(chunk, &prev);
        prev = current;
    }
}

fn xor_in_place(block: &mut [u8], other: &[u8; BLOCK_LEN]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

fn corrupt(msg: impl Into<String>) -> LockboxError {
    LockboxError::new(ErrorCategory::User, ErrorKind::CorruptContainer, msg)
}

fn bad_padding() -> LockboxError {
    LockboxError::new(
        ErrorCategory::User,
        ErrorKind::InvalidPassword,
        "invalid padding: wrong password or corrupt input",
    )
}
