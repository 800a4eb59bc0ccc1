//! Hiding locked files from casual directory listings
//!
//! Hiding is a best-effort side action: callers log a failure and carry on,
//! it never decides whether a lock or unlock succeeded.

use std::io;
use std::path::Path;

/// Toggles a platform "hidden" attribute on a path.
pub trait FileHider {
    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()>;
}

/// Does nothing. Used where the platform has no hidden attribute, or when
/// the configuration turns hiding off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHider;

impl FileHider for NoopHider {
    fn set_hidden(&self, _path: &Path, _hidden: bool) -> io::Result<()> {
        Ok(())
    }
}

/// Uses the operating system's notion of hidden files.
///
/// On Windows this runs `attrib +h` / `attrib -h`. Elsewhere there is no
/// attribute to set (dot-file naming would change the path) and this
/// behaves like [`NoopHider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHider;

impl FileHider for SystemHider {
    #[cfg(windows)]
    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()> {
        use std::process::{Command, Stdio};

        let flag = if hidden { "+h" } else { "-h" };
        let status = Command::new("attrib")
            .arg(flag)
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("attrib {} exited with {}", flag, status)))
        }
    }

    #[cfg(not(windows))]
    fn set_hidden(&self, _path: &Path, _hidden: bool) -> io::Result<()> {
        Ok(())
    }
}

impl<H: FileHider + ?Sized> FileHider for &H {
    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()> {
        (**self).set_hidden(path, hidden)
    }
}

impl<H: FileHider + ?Sized> FileHider for Box<H> {
    fn set_hidden(&self, path: &Path, hidden: bool) -> io::Result<()> {
        (**self).set_hidden(path, hidden)
    }
}
