//! Password reading functionality

use std::io::{self, BufRead, IsTerminal, Write};

use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, LockboxError, Result};

/// Trait for reading passwords from various sources
pub trait PasswordReader {
    /// Read one password as arbitrary bytes (not necessarily UTF-8).
    ///
    /// `prompt` is shown where the source is interactive. Returns the
    /// password wrapped in `Zeroizing` to ensure it is securely wiped from
    /// memory when dropped.
    fn read_password(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed password (for testing and embedding)
pub struct ConstantPasswordReader {
    password: Zeroizing<Vec<u8>>,
}

impl ConstantPasswordReader {
    pub fn new(password: Vec<u8>) -> Self {
        Self {
            password: Zeroizing::new(password),
        }
    }
}

impl PasswordReader for ConstantPasswordReader {
    fn read_password(&mut self, _prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.password).clone()))
    }
}

/// Reads one password per line from any buffered source, such as stdin.
///
/// The line terminator (`\n` or `\r\n`) is not part of the password. Running
/// out of lines is an error rather than an empty password.
pub struct LinePasswordReader<R> {
    reader: R,
}

impl<R: BufRead> LinePasswordReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> PasswordReader for LinePasswordReader<R> {
    fn read_password(&mut self, _prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        let mut line = Zeroizing::new(Vec::new());
        let n = self.reader.read_until(b'\n', &mut line).map_err(|e| {
            LockboxError::with_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        if n == 0 {
            return Err(LockboxError::new(
                ErrorCategory::User,
                ErrorKind::PasswordUnavailable,
                "no password available on input",
            ));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(line)
    }
}

/// Reads password from terminal with no echo
#[derive(Default)]
pub struct TerminalPasswordReader;

impl TerminalPasswordReader {
    pub fn new() -> Self {
        Self
    }
}

impl PasswordReader for TerminalPasswordReader {
    /// Read password from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 passwords, use --password-stdin instead.
    fn read_password(&mut self, prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(LockboxError::new(
                ErrorCategory::User,
                ErrorKind::PasswordUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        let mut stderr = io::stderr();
        stderr
            .write_all(prompt.as_bytes())
            .and_then(|()| stderr.flush())
            .map_err(|e| {
                LockboxError::with_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // Read password *without echo*
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let password = rpassword::read_password().map_err(|e| {
            LockboxError::with_source(
                ErrorCategory::Internal,
                ErrorKind::PasswordUnavailable,
                format!("failure reading password: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(password.into_bytes()))
    }
}

/// Reads a new password twice and requires both entries to match.
pub fn read_new_password(
    reader: &mut dyn PasswordReader,
    prompt: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    let first = reader.read_password(prompt)?;
    let second = reader.read_password("Confirm password: ")?;
    if *first != *second {
        return Err(LockboxError::new(
            ErrorCategory::User,
            ErrorKind::PasswordMismatch,
            "passwords do not match",
        ));
    }
    Ok(first)
}
