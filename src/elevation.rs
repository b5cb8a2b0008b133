//! Building the process that runs iptables
//!
//! iptables needs root. ruledeck runs as an unprivileged user and reaches
//! iptables one of two ways:
//!
//! - **Remote**: when an SSH host is configured the arguments are sent with
//!   `ssh user@host`, quoted for the remote shell. The remote account is
//!   expected to be allowed to run iptables directly.
//! - **Local**: iptables runs on this machine, elevated when not root.
//!
//! # Local Elevation Strategy
//!
//! - **Preferred**: `run0` when available (systemd v256+, no SUID)
//! - **Terminal fallback**: `sudo`
//! - **No terminal**: `pkexec` for graphical authentication
//!
//! # Environment Variables
//!
//! - `RULEDECK_ELEVATION_METHOD`: Force a specific elevation method (`sudo`, `run0`, or `pkexec`).
//!   Example: `RULEDECK_ELEVATION_METHOD=sudo ruledeck delete INPUT 3`
//!
//! - `RULEDECK_IPTABLES_COMMAND`: Run this binary instead of the configured
//!   `iptables` (e.g. `iptables-legacy`, or a stub in tests).
//!
//! - `RULEDECK_TEST_NO_ELEVATION`: Bypass elevation entirely (for testing only).
//!
//! # Security
//!
//! - Local commands are spawned without a shell
//! - SSH host and user are validated so they cannot be read as ssh options
//! - Remote arguments are single-quoted before they reach the remote shell
//!
//! # Example
//!
//! ```no_run
//! use ruledeck::config::AppConfig;
//! use ruledeck::elevation::create_iptables_command;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let args = vec!["-L".to_string(), "-n".to_string()];
//! let mut cmd = create_iptables_command(&AppConfig::default(), &args)?;
//! let output = cmd.output().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{AppConfig, SshConfig};
use crate::validators::validate_ssh_part;
use std::io;
use tokio::process::Command;

/// Error type for privilege elevation operations
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// pkexec binary not found in PATH
    #[error("pkexec not found - please install PolicyKit")]
    PkexecNotFound,

    /// ssh binary not found in PATH
    #[error("ssh not found - please install an OpenSSH client")]
    SshNotFound,

    /// Requested elevation method is not available (binary not found)
    #[error("Elevation method '{0}' is not available (binary not found)")]
    MethodNotAvailable(String),

    /// Invalid value for `RULEDECK_ELEVATION_METHOD`
    #[error("Invalid RULEDECK_ELEVATION_METHOD '{0}'. Valid options: sudo, run0, pkexec")]
    InvalidMethod(String),

    /// Configured SSH host or user is unusable
    #[error("Invalid SSH target: {0}")]
    InvalidTarget(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Checks if a binary exists in PATH
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Binary to run: `RULEDECK_IPTABLES_COMMAND` when set, else the configured one.
pub fn iptables_program(config: &AppConfig) -> String {
    std::env::var("RULEDECK_IPTABLES_COMMAND")
        .ok()
        .filter(|program| !program.trim().is_empty())
        .unwrap_or_else(|| config.iptables_binary.clone())
}

/// Quotes `arg` for a POSIX shell, leaving plain words untouched.
pub(crate) fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn build_ssh_command(
    ssh: &SshConfig,
    program: &str,
    args: &[String],
) -> Result<Command, ElevationError> {
    validate_ssh_part("host", &ssh.host).map_err(ElevationError::InvalidTarget)?;
    validate_ssh_part("user", &ssh.username).map_err(ElevationError::InvalidTarget)?;

    if std::env::var("RULEDECK_TEST_NO_ELEVATION").is_err() && !binary_exists("ssh") {
        return Err(ElevationError::SshNotFound);
    }

    let remote = std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ");

    let mut cmd = Command::new("ssh");
    cmd.arg("-p")
        .arg(ssh.port.to_string())
        .arg("-o")
        .arg(format!("ConnectTimeout={}", ssh.connect_timeout_secs))
        .arg("-o")
        .arg("BatchMode=yes");
    if let Some(identity) = &ssh.identity_file {
        cmd.arg("-i").arg(identity);
    }
    cmd.arg(format!("{}@{}", ssh.username, ssh.host)).arg(remote);
    Ok(cmd)
}

fn build_elevated_command(program: &str, args: &[String]) -> Result<Command, ElevationError> {
    use std::os::fd::AsFd;

    // 1. Strict Test Mode Override (Highest Priority)
    if std::env::var("RULEDECK_TEST_NO_ELEVATION").is_ok() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    }

    // 2. Direct Root Execution (No prompt needed)
    if nix::unistd::getuid().is_root() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    }

    // 3. Explicit elevation method override
    if let Ok(method) = std::env::var("RULEDECK_ELEVATION_METHOD") {
        let method = method.to_lowercase();
        if !method.is_empty() {
            return match method.as_str() {
                "sudo" | "run0" | "pkexec" => {
                    if !binary_exists(&method) {
                        return Err(ElevationError::MethodNotAvailable(method));
                    }
                    let mut cmd = Command::new(&method);
                    cmd.arg(program).args(args);
                    Ok(cmd)
                }
                _ => Err(ElevationError::InvalidMethod(method)),
            };
        }
    }

    // 4. Automatic detection - prefer run0, fallback to sudo/pkexec
    if binary_exists("run0") {
        let mut cmd = Command::new("run0");
        cmd.arg(program).args(args);
        return Ok(cmd);
    }

    let is_atty = nix::unistd::isatty(std::io::stdin().as_fd()).unwrap_or(false);

    if is_atty {
        let mut cmd = Command::new("sudo");
        cmd.arg(program).args(args);
        Ok(cmd)
    } else {
        if !binary_exists("pkexec") {
            return Err(ElevationError::PkexecNotFound);
        }

        let mut cmd = Command::new("pkexec");
        cmd.arg(program).args(args);
        Ok(cmd)
    }
}

/// Creates the command that runs iptables with `args`
///
/// Over ssh when `config.ssh` is set, otherwise locally with elevation.
/// Arguments are never interpreted by a local shell.
///
/// # Errors
///
/// Returns `Err(ElevationError)` if the SSH target is invalid, or ssh or the
/// requested elevation method is not available.
pub fn create_iptables_command(
    config: &AppConfig,
    args: &[String],
) -> Result<Command, ElevationError> {
    let program = iptables_program(config);
    match &config.ssh {
        Some(ssh) => build_ssh_command(ssh, &program, args),
        None => build_elevated_command(&program, args),
    }
}
