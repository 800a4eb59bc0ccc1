//! Lockbox CLI - master-password file and folder locking
//!
//! Locks files into `.locked` containers (AES-256-CBC, PBKDF2-HMAC-SHA256
//! key derivation) after checking the master password.

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process;

use tracing_subscriber::EnvFilter;

use lockbox::Locker;
use lockbox::batch::BatchReport;
use lockbox::config::{CREDENTIAL_FILE_ENV, Config};
use lockbox::credential::FileCredentialStore;
use lockbox::error::{ErrorCategory, ErrorKind, LockboxError, Result};
use lockbox::file_ops::Overwrite;
use lockbox::password::{
    LinePasswordReader, PasswordReader, TerminalPasswordReader, read_new_password,
};

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(version)]
#[command(about = "Lock files and folders behind a master password.", long_about = None)]
struct Cli {
    /// Read passwords from stdin, one per line, instead of from the terminal
    #[arg(long, global = true)]
    password_stdin: bool,

    /// Path of the master password record
    #[arg(long, global = true, value_name = "FILE", env = CREDENTIAL_FILE_ENV)]
    credential_file: Option<PathBuf>,

    /// Fail instead of replacing files that already exist
    #[arg(long, global = true)]
    no_clobber: bool,

    /// Do not set the hidden attribute on locked files
    #[arg(long, global = true)]
    no_hide: bool,

    /// Log more (repeat for debug output); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the master password for the first time
    Setup,

    /// Change the master password
    Passwd,

    /// Show whether a master password is set
    Status,

    /// Lock a file, or every file in a folder
    #[command(alias = "l")]
    Lock {
        /// File or folder to lock
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Unlock a `.locked` file, or every `.locked` file in a folder
    #[command(alias = "u")]
    Unlock {
        /// File or folder to unlock
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Where to write the unlocked file (single files only)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e.chain());
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let overwrite = if cli.no_clobber {
        Overwrite::Refuse
    } else {
        Overwrite::Replace
    };
    let config = Config::resolve(cli.credential_file)?
        .with_overwrite(overwrite)
        .with_hiding(!cli.no_hide);
    tracing::debug!(credential_file = %config.credential_file.display(), "resolved configuration");

    let locker = Locker::new(
        FileCredentialStore::new(&config.credential_file),
        config.hider(),
        config.options,
    );
    let mut reader = get_password_reader(cli.password_stdin);

    match cli.command {
        Commands::Setup => {
            if locker.is_set_up() {
                return Err(LockboxError::new(
                    ErrorCategory::User,
                    ErrorKind::AlreadyExists,
                    "master password is already set; use passwd to change it",
                ));
            }
            let password = read_new_password(&mut *reader, "New master password: ")?;
            locker.setup(&password)?;
            println!("Master password set.");
        }
        Commands::Passwd => {
            let current = reader.read_password("Current master password: ")?;
            let new = read_new_password(&mut *reader, "New master password: ")?;
            locker.change_password(&current, &new)?;
            println!("Master password changed.");
        }
        Commands::Status => {
            let state = if locker.is_set_up() { "set" } else { "not set" };
            println!(
                "Master password {} ({})",
                state,
                locker.store().path().display()
            );
        }
        Commands::Lock { path } => {
            let password = reader.read_password("Master password: ")?;
            if path.is_dir() {
                let report = locker.lock_folder(&path, &password, |index, total, name| {
                    eprintln!("[{}/{}] Locking {}", index, total, name);
                })?;
                finish_folder(&report)?;
            } else {
                let locked = locker.lock_file(&path, &password)?;
                println!("Locked {}", locked.display());
            }
        }
        Commands::Unlock { path, output } => {
            let password = reader.read_password("Master password: ")?;
            if path.is_dir() {
                if output.is_some() {
                    return Err(LockboxError::new(
                        ErrorCategory::User,
                        ErrorKind::Io,
                        "--output applies to single files, not folders",
                    ));
                }
                let report = locker.unlock_folder(&path, &password, |index, total, name| {
                    eprintln!("[{}/{}] Unlocking {}", index, total, name);
                })?;
                finish_folder(&report)?;
            } else {
                let unlocked = locker.unlock_file(&path, &password, output.as_deref())?;
                println!("Unlocked {}", unlocked.display());
            }
        }
    }

    Ok(())
}

/// Prints the summary; a folder where nothing succeeded is an error.
fn finish_folder(report: &BatchReport) -> Result<()> {
    if report.is_success() {
        println!("{}", report);
        Ok(())
    } else {
        Err(LockboxError::new(
            ErrorCategory::User,
            ErrorKind::Io,
            report.message(),
        ))
    }
}

fn get_password_reader(use_stdin: bool) -> Box<dyn PasswordReader> {
    if use_stdin {
        Box::new(LinePasswordReader::new(io::stdin().lock()))
    } else {
        Box::new(TerminalPasswordReader::new())
    }
}
