//! Runtime configuration

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::conceal::{FileHider, NoopHider, SystemHider};
use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use crate::file_ops::{LockOptions, Overwrite};

/// File name of the credential record inside the config directory.
pub const CREDENTIAL_FILE_NAME: &str = "master_password.hash";

/// Environment variable overriding the credential file location.
pub const CREDENTIAL_FILE_ENV: &str = "LOCKBOX_CREDENTIAL_FILE";

#[derive(Debug, Clone)]
pub struct Config {
    pub credential_file: PathBuf,
    pub options: LockOptions,
    /// Set the platform hidden attribute on containers after locking.
    pub hide_locked: bool,
}

impl Config {
    pub fn new(credential_file: impl Into<PathBuf>) -> Self {
        Self {
            credential_file: credential_file.into(),
            options: LockOptions::default(),
            hide_locked: true,
        }
    }

    /// Uses `credential_file` when given, the per-user config directory
    /// otherwise.
    pub fn resolve(credential_file: Option<PathBuf>) -> Result<Self> {
        match credential_file {
            Some(path) => Ok(Self::new(path)),
            None => default_credential_file().map(Self::new),
        }
    }

    pub fn with_overwrite(mut self, overwrite: Overwrite) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    pub fn with_hiding(mut self, hide_locked: bool) -> Self {
        self.hide_locked = hide_locked;
        self
    }

    pub fn hider(&self) -> Box<dyn FileHider + Send + Sync> {
        if self.hide_locked {
            Box::new(SystemHider)
        } else {
            Box::new(NoopHider)
        }
    }
}

/// `<config dir>/lockbox/master_password.hash` on the current platform.
pub fn default_credential_file() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "lockbox").ok_or_else(|| {
        LockboxError::new(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!(
                "could not determine a home directory; pass --credential-file or set {}",
                CREDENTIAL_FILE_ENV
            ),
        )
    })?;
    Ok(dirs.config_dir().join(CREDENTIAL_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let config = Config::resolve(Some(PathBuf::from("/tmp/cred.hash"))).unwrap();
        assert_eq!(config.credential_file, PathBuf::from("/tmp/cred.hash"));
        assert_eq!(config.options.overwrite, Overwrite::Replace);
        assert!(config.hide_locked);
    }

    #[test]
    fn test_default_path_file_name() {
        // Home may be unavailable in sandboxed test environments.
        if let Ok(path) = default_credential_file() {
            assert!(path.ends_with(CREDENTIAL_FILE_NAME));
        }
    }

    #[test]
    fn test_builders() {
        let config = Config::new("c")
            .with_overwrite(Overwrite::Refuse)
            .with_hiding(false);
        assert_eq!(config.options.overwrite, Overwrite::Refuse);
        assert!(!config.hide_locked);
    }
}
