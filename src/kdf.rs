//! Password-based key derivation
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 at a fixed iteration count. The
//! count is not recorded in locked containers, so changing it makes every
//! previously locked file unreadable.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count. Part of the on-disk protocol.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Fills a fresh salt from the operating system RNG.
pub fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 32-byte key from a password.
///
/// When `salt` is `None` a random one is generated. The salt actually used
/// is returned next to the key so callers can store it.
pub fn derive_key(
    password: &[u8],
    salt: Option<[u8; SALT_LEN]>,
) -> Result<(Zeroizing<[u8; KEY_LEN]>, [u8; SALT_LEN])> {
    let salt = salt.unwrap_or_else(random_salt);
    let key = pbkdf2_sha256(password, &salt)?;
    Ok((key, salt))
}

/// Raw PBKDF2-HMAC-SHA256 with the protocol iteration count.
pub(crate) fn pbkdf2_sha256(password: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::<Hmac<Sha256>>(password, salt, KDF_ITERATIONS, out.as_mut_slice()).map_err(|e| {
        LockboxError::new(
            ErrorCategory::Internal,
            ErrorKind::CipherError,
            format!("PBKDF2 key derivation failed: {}", e),
        )
    })?;
    Ok(out)
}
