//! The tiny program that finishes an update once the application has exited.
//!
//! ```text
//! update-installer [-w <pid>] [-d <old version file>] <new version file> [-- <args>...]
//! ```
//!
//! Anything after `--` is passed through to the new version.
//!
//! Exit status is 0 on success and 1 on any usage, validation or launch error.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;

use crate::utils::command::{make_executable, spawn_detached, wait_for_exit};
use crate::utils::{InstallError, LogFacade, Logger};

pub const INSTALLER_VERSION_STRING: &str = env!("CARGO_PKG_VERSION");
pub const PARENT_EXIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(
    name = "update-installer",
    about = "Launches a downloaded update and optionally removes the old version"
)]
pub struct InstallerArgs {
    /// Delete this file once the new version has been launched
    #[arg(short = 'd', value_name = "OLD_VERSION_FILE")]
    pub delete: Option<PathBuf>,

    /// Wait for this process to exit before doing anything
    #[arg(short = 'w', value_name = "PID")]
    pub wait_pid: Option<u32>,

    /// The downloaded new version
    #[arg(value_name = "NEW_VERSION_FILE")]
    pub new_version: PathBuf,

    /// Arguments for the new version
    #[arg(last = true, value_name = "ARGS")]
    pub passthrough: Vec<OsString>,
}

/// Parse `args` (program name first) and run the helper. Returns the exit code.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    println!("Updater version {}", INSTALLER_VERSION_STRING);

    let parsed = match InstallerArgs::try_parse_from(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    print!("{}", e);
                    0
                }
                _ => {
                    eprint!("{}", InstallError::Usage(e.to_string()));
                    1
                }
            };
        }
    };

    match install(&parsed, &LogFacade) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

pub fn install(args: &InstallerArgs, logger: &dyn Logger) -> Result<(), InstallError> {
    if let Some(pid) = args.wait_pid {
        println!("Waiting for process {} to exit...", pid);
        if !wait_for_exit(pid, PARENT_EXIT_TIMEOUT) {
            logger.warn(&format!(
                "Process {} still running after {}s, continuing anyway",
                pid,
                PARENT_EXIT_TIMEOUT.as_secs()
            ));
        }
    }

    let new_version = &args.new_version;
    if !new_version.is_file() {
        return Err(InstallError::NotFound(new_version.clone()));
    }

    println!("Launching new version...");
    launch_new_version(new_version, &args.passthrough, logger)?;

    if let Some(ref old_version) = args.delete {
        println!("Deleting old version...");
        if !old_version.is_file() {
            return Err(InstallError::NotFound(old_version.clone()));
        }
        std::fs::remove_file(old_version)?;
    }

    Ok(())
}

fn launch_new_version(path: &Path, passthrough: &[OsString], logger: &dyn Logger) -> Result<(), InstallError> {
    let launch_err = |source: std::io::Error| InstallError::Launch {
        path: path.to_path_buf(),
        source,
    };

    make_executable(path).map_err(launch_err)?;
    let absolute = std::fs::canonicalize(path).map_err(launch_err)?;

    let mut cmd = Command::new(&absolute);
    cmd.args(passthrough);
    if let Some(dir) = absolute.parent() {
        cmd.current_dir(dir);
    }
    let child = spawn_detached(&mut cmd).map_err(launch_err)?;
    logger.info(&format!("Started {} (pid {})", absolute.display(), child.id()));
    Ok(())
}
