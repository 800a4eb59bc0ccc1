//! Master password storage and verification
//!
//! A credential is a PBKDF2-HMAC-SHA256 hash of the master password under
//! its own random salt, using the same iteration count as file keys. It is
//! stored as `hex(salt) || hex(hash)`: 32 + 64 lowercase hex characters.
//!
//! There is exactly one credential per store. Stores do no locking; a single
//! writer per backing record is assumed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use crate::file_ops::{Overwrite, write_atomic};
use crate::kdf::{self, KEY_LEN, SALT_LEN};

/// Minimum length of a new master password, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Length of a serialized record in hex characters.
pub const RECORD_HEX_LEN: usize = 2 * (SALT_LEN + KEY_LEN);

/// A salted password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub salt: [u8; SALT_LEN],
    pub hash: [u8; KEY_LEN],
}

impl CredentialRecord {
    /// Hashes `password` under a fresh random salt.
    pub fn create(password: &[u8]) -> Result<Self> {
        let salt = kdf::random_salt();
        let hash = kdf::pbkdf2_sha256(password, &salt)?;
        Ok(Self { salt, hash: *hash })
    }

    /// Recomputes the hash under the stored salt and compares.
    pub fn verify(&self, password: &[u8]) -> bool {
        match kdf::pbkdf2_sha256(password, &self.salt) {
            Ok(candidate) => hashes_match(&candidate, &self.hash),
            Err(e) => {
                warn!(error = %e, "could not hash password for verification");
                false
            }
        }
    }

    pub fn to_hex(&self) -> String {
        let mut out = hex::encode(self.salt);
        out.push_str(&hex::encode(self.hash));
        out
    }

    /// Parses the stored text form. Surrounding whitespace is ignored.
    pub fn from_hex(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.len() != RECORD_HEX_LEN {
            return Err(malformed(format!(
                "expected {} hex characters, found {}",
                RECORD_HEX_LEN,
                text.len()
            )));
        }
        let bytes = hex::decode(text).map_err(|e| {
            LockboxError::with_source(
                ErrorCategory::User,
                ErrorKind::Io,
                "credential record is not valid hex",
                e,
            )
        })?;
        let (salt, hash) = bytes.split_at(SALT_LEN);
        Ok(Self {
            salt: salt.try_into().map_err(|_| malformed("bad salt length"))?,
            hash: hash.try_into().map_err(|_| malformed("bad hash length"))?,
        })
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("salt", &hex::encode(self.salt))
            .field("hash", &"<redacted>")
            .finish()
    }
}

/// Storage for the single master credential.
///
/// Implementors provide `load`/`store`; the password operations are shared.
pub trait CredentialStore {
    /// Reads the record, `Ok(None)` when none has been set.
    fn load(&self) -> Result<Option<CredentialRecord>>;

    /// Replaces the record wholesale.
    fn store(&self, record: &CredentialRecord) -> Result<()>;

    /// True iff a record exists.
    ///
    /// A record that is present but unreadable or malformed still counts, so
    /// it cannot be replaced without going through [`CredentialStore::change`].
    fn is_set(&self) -> bool {
        !matches!(self.load(), Ok(None))
    }

    /// Hashes `password` under a fresh salt and stores it, replacing any
    /// previous record. Fails only when storage fails.
    fn set(&self, password: &[u8]) -> Result<()> {
        let record = CredentialRecord::create(password)?;
        self.store(&record)
    }

    /// Checks `password` against the stored record.
    ///
    /// A missing or unreadable record and a wrong password all give `false`.
    fn authenticate(&self, password: &[u8]) -> bool {
        match self.load() {
            Ok(Some(record)) => record.verify(password),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e.chain(), "could not load credential record");
                false
            }
        }
    }

    /// Replaces the master password after checking the current one.
    ///
    /// Checks run in order: current password, new password length, new
    /// password differing from the current one.
    fn change(&self, old_password: &[u8], new_password: &[u8]) -> Result<()> {
        if !self.authenticate(old_password) {
            return Err(LockboxError::new(
                ErrorCategory::User,
                ErrorKind::WrongCredential,
                "current password is incorrect",
            ));
        }
        check_strength(new_password)?;
        if old_password == new_password {
            return Err(LockboxError::new(
                ErrorCategory::User,
                ErrorKind::SamePassword,
                "new password must be different from current password",
            ));
        }
        self.set(new_password)
    }
}

/// Rejects passwords shorter than [`MIN_PASSWORD_LEN`] characters.
///
/// Length is counted in characters for UTF-8 input and in bytes otherwise.
pub fn check_strength(password: &[u8]) -> Result<()> {
    let len = std::str::from_utf8(password).map_or(password.len(), |s| s.chars().count());
    if len < MIN_PASSWORD_LEN {
        return Err(LockboxError::new(
            ErrorCategory::User,
            ErrorKind::WeakPassword,
            format!("new password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Credential kept in a single text file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<CredentialRecord>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockboxError::io("read", &self.path, e)),
        };
        CredentialRecord::from_hex(&text)
            .map(Some)
            .map_err(|e| e.with_context(format!("corrupt credential file {}", self.path.display())))
    }

    fn store(&self, record: &CredentialRecord) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| LockboxError::io("create", dir, e))?;
        }
        write_atomic(&self.path, record.to_hex().as_bytes(), Overwrite::Replace)?;
        debug!(path = %self.path.display(), "stored credential record");
        Ok(())
    }
}

/// Credential held in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<CredentialRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<CredentialRecord>> {
        self.record
            .lock()
            .map(|record| record.clone())
            .map_err(|_| poisoned())
    }

    fn store(&self, record: &CredentialRecord) -> Result<()> {
        let mut slot = self.record.lock().map_err(|_| poisoned())?;
        *slot = Some(record.clone());
        Ok(())
    }
}

/// Compares in time independent of where the first difference is.
fn hashes_match(a: &[u8; KEY_LEN], b: &[u8; KEY_LEN]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn malformed(msg: impl Into<String>) -> LockboxError {
    LockboxError::new(ErrorCategory::User, ErrorKind::Io, msg)
}

fn poisoned() -> LockboxError {
    LockboxError::new(
        ErrorCategory::Internal,
        ErrorKind::Io,
        "credential store lock poisoned",
    )
}
