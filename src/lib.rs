//! Lockbox - master-password file and folder locking
//!
//! Files are sealed into `.locked` containers with AES-256-CBC under a key
//! derived from the password with PBKDF2-HMAC-SHA256.

#![forbid(unsafe_code)]

pub mod batch;
pub mod conceal;
pub mod config;
pub mod container;
pub mod credential;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod locker;
pub mod password;

pub use error::{ErrorCategory, ErrorKind, LockboxError, Result};
pub use locker::Locker;
