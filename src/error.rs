use std::error::Error as StdError;
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Condition tags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The file or directory does not exist.
    NotFound,
    /// The operating system refused access to the path.
    PermissionDenied,
    /// Any other failure interacting with the filesystem or stdin/stdout.
    Io,
    /// The locked container is too short or not block aligned.
    CorruptContainer,
    /// The container decrypted to invalid padding: wrong password or
    /// corruption. The two cannot be told apart.
    InvalidPassword,
    /// The supplied master password does not match the stored credential.
    WrongCredential,
    /// A new master password is shorter than the minimum length.
    WeakPassword,
    /// A new master password equals the current one.
    SamePassword,
    /// Key derivation or the block cipher rejected its input.
    CipherError,
    /// The target already exists and the overwrite policy forbids replacing it.
    AlreadyExists,
    /// A folder operation was pointed at something that is not a directory.
    NotADirectory,
    /// A folder contained no file eligible for the requested operation.
    NothingToProcess,
    /// A password could not be obtained from the configured reader.
    PasswordUnavailable,
    /// A new password and its confirmation differ.
    PasswordMismatch,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct LockboxError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Specific condition tag.
    pub kind: ErrorKind,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl LockboxError {
    /// Creates a new error with a category, kind and display message.
    pub fn new(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Classifies an I/O failure on `path`.
    ///
    /// `NotFound` and `PermissionDenied` keep their own kinds so callers can
    /// report them precisely; everything else is `Io`.
    pub fn io(action: &str, path: &Path, err: io::Error) -> Self {
        let (category, kind) = match err.kind() {
            io::ErrorKind::NotFound => (ErrorCategory::User, ErrorKind::NotFound),
            io::ErrorKind::PermissionDenied => (ErrorCategory::User, ErrorKind::PermissionDenied),
            io::ErrorKind::AlreadyExists => (ErrorCategory::User, ErrorKind::AlreadyExists),
            _ => (ErrorCategory::Internal, ErrorKind::Io),
        };
        Self::with_source(
            category,
            kind,
            format!("failed to {} {}", action, path.display()),
            err,
        )
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// The message followed by every underlying cause, `: `-separated.
    pub fn chain(&self) -> String {
        let mut out = self.msg.clone();
        let mut next = StdError::source(self);
        while let Some(cause) = next {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            next = cause.source();
        }
        out
    }

    /// Wraps the current error with a higher-level message while preserving
    /// the original as source. Category and kind carry over unchanged.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LockboxError>;
