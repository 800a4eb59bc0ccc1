//! Locking and unlocking whole folders
//!
//! Files are processed one at a time in a reproducible order (names sorted
//! within each directory, symlinks not followed). A failure on one file is
//! recorded and the batch moves on.
//!
//! [`BatchRun`] is an iterator of [`BatchEvent`]s: a `Started` event before
//! each file is touched and a `Finished` event carrying its outcome. Callers
//! that want to stay responsive drain it on a worker thread and can stop
//! between files by dropping it. [`encrypt_tree`] and [`decrypt_tree`] drain
//! it for callers that only want a progress callback and a summary.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::vec;

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zeroize::Zeroizing;

use crate::conceal::FileHider;
use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use crate::file_ops::{self, LockOptions};

/// Failed file names listed in a summary message before "and N more".
pub const MAX_LISTED_FAILURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Lock,
    Unlock,
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Direction::Lock => "lock",
            Direction::Unlock => "unlock",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Direction::Lock => "locked",
            Direction::Unlock => "unlocked",
        }
    }

    fn wants(self, path: &Path) -> bool {
        file_ops::is_locked_path(path) == (self == Direction::Unlock)
    }
}

/// Result of transforming one file.
#[derive(Debug)]
pub struct FileOutcome {
    /// 1-based position in the batch.
    pub index: usize,
    pub total: usize,
    pub path: PathBuf,
    /// The path written on success.
    pub result: Result<PathBuf>,
}

impl FileOutcome {
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

#[derive(Debug)]
pub enum BatchEvent {
    /// Emitted before the file at `path` is touched.
    Started {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    Finished(FileOutcome),
}

/// Lists the files a folder operation would touch, in processing order.
pub fn collect_targets(root: &Path, direction: Direction) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(root).map_err(|e| LockboxError::io("open folder", root, e))?;
    if !metadata.is_dir() {
        return Err(LockboxError::new(
            ErrorCategory::User,
            ErrorKind::NotADirectory,
            format!("not a folder: {}", root.display()),
        ));
    }

    let mut targets = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry while walking folder");
                continue;
            }
        };
        if entry.file_type().is_file() && direction.wants(entry.path()) {
            targets.push(entry.into_path());
        }
    }

    if targets.is_empty() {
        let msg = match direction {
            Direction::Lock => "no files found in folder",
            Direction::Unlock => "no locked files found in folder",
        };
        return Err(LockboxError::new(
            ErrorCategory::User,
            ErrorKind::NothingToProcess,
            format!("{}: {}", msg, root.display()),
        ));
    }
    Ok(targets)
}

/// A folder operation in progress.
pub struct BatchRun<H> {
    direction: Direction,
    password: Zeroizing<Vec<u8>>,
    options: LockOptions,
    hider: H,
    total: usize,
    targets: std::iter::Enumerate<vec::IntoIter<PathBuf>>,
    pending: Option<(usize, PathBuf)>,
}

impl<H: FileHider> BatchRun<H> {
    /// Enumerates the folder up front; files created while the run is
    /// drained (such as the containers it writes) are not picked up.
    pub fn new(
        root: &Path,
        direction: Direction,
        password: &[u8],
        options: LockOptions,
        hider: H,
    ) -> Result<Self> {
        let targets = collect_targets(root, direction)?;
        debug!(
            root = %root.display(),
            files = targets.len(),
            ?direction,
            "planned folder operation"
        );
        Ok(Self {
            direction,
            password: Zeroizing::new(password.to_vec()),
            options,
            hider,
            total: targets.len(),
            targets: targets.into_iter().enumerate(),
            pending: None,
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Drains the run, calling `on_progress(index, total, file_name)` before
    /// each file, and summarises the outcomes.
    pub fn finish<F>(self, mut on_progress: F) -> BatchReport
    where
        F: FnMut(usize, usize, &str),
    {
        let mut report = BatchReport::new(self.direction, self.total);
        for event in self {
            match event {
                BatchEvent::Started { index, total, path } => {
                    on_progress(index, total, &display_name(&path));
                }
                BatchEvent::Finished(outcome) => report.record(&outcome),
            }
        }
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "{}",
            report.message()
        );
        report
    }

    fn process(&self, path: &Path) -> Result<PathBuf> {
        match self.direction {
            Direction::Lock => {
                let locked = file_ops::encrypt_file(path, &self.password, &self.options)?;
                if let Err(e) = self.hider.set_hidden(&locked, true) {
                    warn!(path = %locked.display(), error = %e, "could not hide locked file");
                }
                Ok(locked)
            }
            Direction::Unlock => {
                if let Err(e) = self.hider.set_hidden(path, false) {
                    warn!(path = %path.display(), error = %e, "could not unhide locked file");
                }
                file_ops::decrypt_file(path, &self.password, None, &self.options)
            }
        }
    }
}

impl<H: FileHider> Iterator for BatchRun<H> {
    type Item = BatchEvent;

    fn next(&mut self) -> Option<BatchEvent> {
        if let Some((index, path)) = self.pending.take() {
            let result = self.process(&path);
            if let Err(e) = &result {
                warn!(
                    path = %path.display(),
                    error = %e.chain(),
                    "failed to {} file",
                    self.direction.verb()
                );
            }
            return Some(BatchEvent::Finished(FileOutcome {
                index,
                total: self.total,
                path,
                result,
            }));
        }

        let (position, path) = self.targets.next()?;
        let index = position + 1;
        self.pending = Some((index, path.clone()));
        Some(BatchEvent::Started {
            index,
            total: self.total,
            path,
        })
    }
}

/// Summary of a drained folder operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub direction: Direction,
    pub total: usize,
    pub succeeded: usize,
    /// Names of every file that failed, in processing order.
    pub failed: Vec<String>,
}

impl BatchReport {
    fn new(direction: Direction, total: usize) -> Self {
        Self {
            direction,
            total,
            succeeded: 0,
            failed: Vec::new(),
        }
    }

    fn record(&mut self, outcome: &FileOutcome) {
        match outcome.result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed.push(outcome.file_name()),
        }
    }

    /// True when at least one file was transformed; partial success counts.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    /// True when every file was transformed.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listed = self
            .failed
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        if self.is_complete() {
            return write!(
                f,
                "Successfully {} {} file(s) in folder",
                self.direction.past(),
                self.succeeded
            );
        }

        if self.is_success() {
            let past = self.direction.past();
            write!(
                f,
                "{}{} {}/{} files. Failed: {}",
                past[..1].to_ascii_uppercase(),
                &past[1..],
                self.succeeded,
                self.total,
                listed
            )?;
        } else {
            write!(
                f,
                "Failed to {} any files. Errors: {}",
                self.direction.verb(),
                listed
            )?;
        }
        if self.failed.len() > MAX_LISTED_FAILURES {
            write!(f, " and {} more", self.failed.len() - MAX_LISTED_FAILURES)?;
        }
        Ok(())
    }
}

/// Lock every regular file under `root` that is not already locked.
pub fn encrypt_tree<H, F>(
    root: &Path,
    password: &[u8],
    options: &LockOptions,
    hider: H,
    on_progress: F,
) -> Result<BatchReport>
where
    H: FileHider,
    F: FnMut(usize, usize, &str),
{
    let run = BatchRun::new(root, Direction::Lock, password, *options, hider)?;
    Ok(run.finish(on_progress))
}

/// Unlock every `.locked` file under `root`.
pub fn decrypt_tree<H, F>(
    root: &Path,
    password: &[u8],
    options: &LockOptions,
    hider: H,
    on_progress: F,
) -> Result<BatchReport>
where
    H: FileHider,
    F: FnMut(usize, usize, &str),
{
    let run = BatchRun::new(root, Direction::Unlock, password, *options, hider)?;
    Ok(run.finish(on_progress))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
