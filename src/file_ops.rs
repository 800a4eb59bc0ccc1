//! Locking and unlocking single files
//!
//! Locking writes `<name>.locked` next to the original and then destroys the
//! original. Unlocking writes the plaintext back and removes the container.
//! Destroying the original and removing the container are best-effort: once
//! the new file is safely on disk the operation has succeeded, and failures
//! in the cleanup step are only logged.

use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::container;
use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};

/// Appended to a file name to form its container name.
pub const LOCKED_SUFFIX: &str = ".locked";

/// Appended when unlocking a container whose name lacks [`LOCKED_SUFFIX`].
pub const DECRYPTED_SUFFIX: &str = ".decrypted";

/// What to do when the file an operation would create already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overwrite {
    /// Atomically replace the existing file.
    #[default]
    Replace,
    /// Fail with [`ErrorKind::AlreadyExists`].
    Refuse,
}

/// Options shared by single-file and folder operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockOptions {
    pub overwrite: Overwrite,
}

/// `notes.txt` becomes `notes.txt.locked`.
pub fn locked_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(LOCKED_SUFFIX);
    PathBuf::from(name)
}

/// Whether the file name carries [`LOCKED_SUFFIX`].
pub fn is_locked_path(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(LOCKED_SUFFIX))
}

/// Default output for unlocking `locked`: the suffix stripped, or
/// [`DECRYPTED_SUFFIX`] appended when there is nothing to strip.
///
/// Works on the raw file name, so names that are not valid UTF-8 come back
/// unchanged.
pub fn unlocked_path_for(locked: &Path) -> PathBuf {
    let locked_ext = OsStr::new(&LOCKED_SUFFIX[1..]);
    let stripped = locked
        .file_stem()
        .filter(|_| locked.extension() == Some(locked_ext));

    match stripped {
        Some(name) => locked.with_file_name(name),
        None => {
            let mut name = OsString::from(locked.as_os_str());
            name.push(DECRYPTED_SUFFIX);
            PathBuf::from(name)
        }
    }
}

/// Lock a file with a password
///
/// Reads the plaintext at `path`, writes the container to
/// `<path>.locked` and then shreds the original. Returns the container path.
///
/// If writing the container fails the original is left untouched. If
/// shredding fails the container is still authoritative and the call
/// succeeds; the leftover original is reported with `tracing::warn!`.
pub fn encrypt_file(path: &Path, password: &[u8], options: &LockOptions) -> Result<PathBuf> {
    let plaintext = read_regular_file(path)?;
    let locked = locked_path_for(path);
    refuse_existing(&locked, options)?;

    let sealed = container::seal(password, &plaintext)
        .map_err(|e| e.with_context(format!("failed to lock {}", path.display())))?;
    write_atomic(&locked, &sealed, options.overwrite)?;
    debug!(path = %path.display(), locked = %locked.display(), "wrote locked container");

    if let Err(e) = shred_file(path) {
        warn!(
            path = %path.display(),
            error = %e.chain(),
            "could not securely delete original; plaintext may remain on disk"
        );
    }

    Ok(locked)
}

/// Unlock a container with a password
///
/// Writes the plaintext to `output`, or to [`unlocked_path_for`] when no
/// output is given, then removes the container. Returns the plaintext path.
///
/// The output file is created with mode 0o600 (read/write for owner only)
/// on Unix systems.
pub fn decrypt_file(
    locked: &Path,
    password: &[u8],
    output: Option<&Path>,
    options: &LockOptions,
) -> Result<PathBuf> {
    let contents = read_regular_file(locked)?;
    let output = output.map_or_else(|| unlocked_path_for(locked), Path::to_path_buf);
    refuse_existing(&output, options)?;

    let plaintext = Zeroizing::new(
        container::open(password, &contents)
            .map_err(|e| e.with_context(format!("failed to unlock {}", locked.display())))?,
    );
    write_atomic(&output, &plaintext, options.overwrite)?;
    debug!(locked = %locked.display(), output = %output.display(), "wrote unlocked file");

    // Unlocking onto the container's own path already replaced it.
    if output != locked {
        if let Err(e) = fs::remove_file(locked) {
            warn!(
                path = %locked.display(),
                error = %e,
                "could not remove locked file after unlocking"
            );
        }
    }

    Ok(output)
}

/// Overwrite a file's full length with random bytes, sync, then remove it.
///
/// Removal is attempted even when the overwrite fails. On copy-on-write or
/// journaling filesystems the old blocks may survive regardless.
pub fn shred_file(path: &Path) -> Result<()> {
    let overwritten = overwrite_with_random(path);
    let removed = fs::remove_file(path).map_err(|e| LockboxError::io("remove", path, e));

    match (overwritten, removed) {
        (_, Err(e)) | (Err(e), Ok(())) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn overwrite_with_random(path: &Path) -> Result<()> {
    let len = fs::metadata(path)
        .map_err(|e| LockboxError::io("stat", path, e))?
        .len();
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| LockboxError::io("open for shredding", path, e))?;

    let mut chunk = [0u8; 64 * 1024];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        OsRng.fill_bytes(&mut chunk[..n]);
        file.write_all(&chunk[..n])
            .map_err(|e| LockboxError::io("overwrite", path, e))?;
        remaining -= n as u64;
    }
    file.sync_all()
        .map_err(|e| LockboxError::io("sync", path, e))?;
    Ok(())
}

fn read_regular_file(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let metadata = fs::metadata(path).map_err(|e| LockboxError::io("access", path, e))?;
    if !metadata.is_file() {
        return Err(LockboxError::new(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("{} is not a regular file", path.display()),
        ));
    }
    fs::read(path)
        .map(Zeroizing::new)
        .map_err(|e| LockboxError::io("read", path, e))
}

fn refuse_existing(target: &Path, options: &LockOptions) -> Result<()> {
    if options.overwrite == Overwrite::Refuse && target.exists() {
        return Err(LockboxError::new(
            ErrorCategory::User,
            ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        ));
    }
    Ok(())
}

/// Write `contents` to `path` via a temp file in the same directory.
///
/// Either the old file or the complete new one is visible at `path`, never a
/// partial write. tempfile creates the file with mode 0o600 on Unix and the
/// rename keeps it.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], overwrite: Overwrite) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| LockboxError::io("create a temporary file in", dir, e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| LockboxError::io("write to tempfile in", dir, e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| LockboxError::io("flush tempfile in", dir, e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| LockboxError::io("sync tempfile in", dir, e))?;

    let persisted = match overwrite {
        Overwrite::Replace => temp_file.persist(path),
        Overwrite::Refuse => temp_file.persist_noclobber(path),
    };
    persisted.map_err(|e| LockboxError::io("rename tempfile to", path, e.error))?;
    Ok(())
}
