//! Master-password gated file and folder locking
//!
//! [`Locker`] ties a [`CredentialStore`] to the file and folder operations.
//! Every lock or unlock first checks the supplied password against the stored
//! credential, and the same password then keys the container. Changing the
//! master password does not re-encrypt anything: containers written under the
//! old password still need it.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::batch::{self, BatchReport};
use crate::conceal::FileHider;
use crate::credential::{self, CredentialStore};
use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use crate::file_ops::{self, LockOptions};

pub struct Locker<S, H> {
    store: S,
    hider: H,
    options: LockOptions,
}

impl<S: CredentialStore, H: FileHider> Locker<S, H> {
    pub fn new(store: S, hider: H, options: LockOptions) -> Self {
        Self {
            store,
            hider,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_set_up(&self) -> bool {
        self.store.is_set()
    }

    /// Records the first master password. Refuses to replace an existing
    /// one; use [`Locker::change_password`] for that.
    pub fn setup(&self, password: &[u8]) -> Result<()> {
        if self.store.is_set() {
            return Err(LockboxError::new(
                ErrorCategory::User,
                ErrorKind::AlreadyExists,
                "master password is already set; use passwd to change it",
            ));
        }
        credential::check_strength(password)?;
        self.store.set(password)?;
        info!("master password set");
        Ok(())
    }

    pub fn authenticate(&self, password: &[u8]) -> bool {
        self.store.authenticate(password)
    }

    pub fn change_password(&self, old_password: &[u8], new_password: &[u8]) -> Result<()> {
        self.store.change(old_password, new_password)?;
        info!("master password changed");
        Ok(())
    }

    /// Encrypts `path` to `<path>.locked`, removes the original and hides
    /// the container.
    pub fn lock_file(&self, path: &Path, password: &[u8]) -> Result<PathBuf> {
        self.authorize(password)?;
        let locked = file_ops::encrypt_file(path, password, &self.options)?;
        if let Err(e) = self.hider.set_hidden(&locked, true) {
            warn!(path = %locked.display(), error = %e, "could not hide locked file");
        }
        info!(path = %locked.display(), "locked file");
        Ok(locked)
    }

    /// Decrypts a `.locked` container, to `output` when given and next to it
    /// otherwise.
    pub fn unlock_file(
        &self,
        locked: &Path,
        password: &[u8],
        output: Option<&Path>,
    ) -> Result<PathBuf> {
        self.authorize(password)?;
        if let Err(e) = self.hider.set_hidden(locked, false) {
            warn!(path = %locked.display(), error = %e, "could not unhide locked file");
        }
        let unlocked = file_ops::decrypt_file(locked, password, output, &self.options)?;
        info!(path = %unlocked.display(), "unlocked file");
        Ok(unlocked)
    }

    pub fn lock_folder<F>(
        &self,
        root: &Path,
        password: &[u8],
        on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(usize, usize, &str),
    {
        self.authorize(password)?;
        batch::encrypt_tree(root, password, &self.options, &self.hider, on_progress)
    }

    pub fn unlock_folder<F>(
        &self,
        root: &Path,
        password: &[u8],
        on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(usize, usize, &str),
    {
        self.authorize(password)?;
        batch::decrypt_tree(root, password, &self.options, &self.hider, on_progress)
    }

    fn authorize(&self, password: &[u8]) -> Result<()> {
        if !self.store.is_set() {
            return Err(LockboxError::new(
                ErrorCategory::User,
                ErrorKind::WrongCredential,
                "no master password set; run setup first",
            ));
        }
        if !self.store.authenticate(password) {
            return Err(LockboxError::new(
                ErrorCategory::User,
                ErrorKind::WrongCredential,
                "incorrect master password",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conceal::NoopHider;
    use crate::conceal::testing::RecordingHider;
    use crate::credential::{FileCredentialStore, MemoryCredentialStore};
    use std::fs;
    use tempfile::TempDir;

    fn locker() -> Locker<MemoryCredentialStore, NoopHider> {
        let locker = Locker::new(MemoryCredentialStore::new(), NoopHider, LockOptions::default());
        locker.setup(b"Secret1").unwrap();
        locker
    }

    #[test]
    fn test_setup_rules() {
        let locker = Locker::new(MemoryCredentialStore::new(), NoopHider, LockOptions::default());
        assert!(!locker.is_set_up());

        let err = locker.setup(b"abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::WeakPassword);
        assert!(!locker.is_set_up());

        locker.setup(b"Secret1").unwrap();
        assert!(locker.is_set_up());
        assert!(locker.authenticate(b"Secret1"));

        let err = locker.setup(b"Another2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
        assert!(locker.authenticate(b"Secret1"));
    }

    #[test]
    fn test_setup_refuses_unreadable_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("master_password.hash");
        let store = FileCredentialStore::new(&path);
        let locker = Locker::new(store, NoopHider, LockOptions::default());
        locker.setup(b"Secret1").unwrap();

        let mut record = fs::read(&path).unwrap();
        record.push(0xff);
        fs::write(&path, &record).unwrap();

        assert!(locker.is_set_up());
        let err = locker.setup(b"Attacker9").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
        assert!(!locker.authenticate(b"Attacker9"));
        assert_eq!(fs::read(&path).unwrap(), record);
    }

    #[test]
    fn test_lock_requires_setup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"x").unwrap();

        let locker = Locker::new(MemoryCredentialStore::new(), NoopHider, LockOptions::default());
        let err = locker.lock_file(&path, b"Secret1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongCredential);
        assert!(path.exists());
    }

    #[test]
    fn test_lock_unlock_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        fs::write(&path, b"hello world").unwrap();

        let hider = RecordingHider::default();
        let store = MemoryCredentialStore::new();
        let locker = Locker::new(store, &hider, LockOptions::default());
        locker.setup(b"Secret1").unwrap();

        let err = locker.lock_file(&path, b"Secret2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongCredential);
        assert!(path.exists());

        let locked = locker.lock_file(&path, b"Secret1").unwrap();
        assert_eq!(locked, temp_dir.path().join("notes.txt.locked"));
        assert!(!path.exists());

        let err = locker.unlock_file(&locked, b"Secret2", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongCredential);
        assert!(locked.exists());

        let unlocked = locker.unlock_file(&locked, b"Secret1", None).unwrap();
        assert_eq!(unlocked, path);
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        assert_eq!(hider.calls(), vec![(locked.clone(), true), (locked, false)]);
    }

    #[test]
    fn test_unlock_to_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        let locker = locker();
        let locked = locker.lock_file(&path, b"Secret1").unwrap();
        let out = temp_dir.path().join("restored.bin");
        let written = locker.unlock_file(&locked, b"Secret1", Some(&out)).unwrap();
        assert_eq!(written, out);
        assert_eq!(fs::read(&out).unwrap(), [0u8, 1, 2, 3]);
    }

    #[test]
    fn test_folder_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["a.txt", "b.txt"] {
            fs::write(root.join(name), name).unwrap();
        }

        let locker = locker();
        let err = locker.lock_folder(root, b"nope!!", |_, _, _| {}).unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongCredential);

        let mut seen = 0;
        let report = locker.lock_folder(root, b"Secret1", |_, _, _| seen += 1).unwrap();
        assert!(report.is_complete());
        assert_eq!(seen, 2);

        let report = locker.unlock_folder(root, b"Secret1", |_, _, _| {}).unwrap();
        assert!(report.is_complete());
        assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "b.txt");
    }

    #[test]
    fn test_change_password_gates_new_operations() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"x").unwrap();

        let locker = locker();
        locker.change_password(b"Secret1", b"Another2").unwrap();

        let err = locker.lock_file(&path, b"Secret1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::WrongCredential);
        locker.lock_file(&path, b"Another2").unwrap();
    }
}
