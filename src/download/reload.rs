//! Making Shimmy pick up a freshly downloaded model.
//!
//! Shimmy has no reload endpoint: we run `shimmy discover`, then SIGTERM the
//! serving process and rely on the container's start script to bring it back
//! with the new model visible. Finding the process by pattern is racy; the
//! outcome is best-effort.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info, warn};

const DISCOVER_TIMEOUT: Duration = Duration::from_secs(10);
const PGREP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("{command} failed: {stderr}")]
    Failed { command: &'static str, stderr: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Asks the backend to rediscover models and restart.
#[async_trait]
pub trait BackendReloadTrigger: Send + Sync {
    /// True iff discovery succeeded; restart problems are only logged.
    async fn reload(&self) -> bool;
}

pub struct ShimmyReload {
    binary: String,
    serve_pattern: String,
}

impl ShimmyReload {
    pub fn new(binary: impl Into<String>, serve_pattern: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            serve_pattern: serve_pattern.into(),
        }
    }

    async fn discover(&self) -> Result<String, ReloadError> {
        let output = timeout(
            DISCOVER_TIMEOUT,
            Command::new(&self.binary)
                .arg("discover")
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ReloadError::Timeout("discover"))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ReloadError::Failed {
                command: "discover",
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    async fn find_serve_pid(&self) -> Result<Option<u32>, ReloadError> {
        let output = timeout(
            PGREP_TIMEOUT,
            Command::new("pgrep")
                .args(["-f", self.serve_pattern.as_str()])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ReloadError::Timeout("pgrep"))??;

        // pgrep exits 1 when nothing matched
        if !output.status.success() {
            return Ok(None);
        }
        Ok(first_pid(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl BackendReloadTrigger for ShimmyReload {
    async fn reload(&self) -> bool {
        match self.discover().await {
            Ok(stdout) => info!("Shimmy discover completed: {}", stdout.trim()),
            Err(e) => {
                error!("Shimmy discover failed: {e}");
                return false;
            }
        }

        match self.find_serve_pid().await {
            Ok(Some(pid)) => {
                info!(pid, "Found Shimmy serve process, terminating for restart");
                match terminate(pid) {
                    Ok(()) => info!("SIGTERM sent to Shimmy server, supervisor will restart it"),
                    Err(e) => warn!("Failed to terminate Shimmy process: {e}"),
                }
            }
            Ok(None) => warn!(
                "Could not find Shimmy serve process, models may not be available until restart"
            ),
            Err(e) => warn!("Failed to look up Shimmy process: {e}"),
        }
        true
    }
}

fn first_pid(pgrep_stdout: &str) -> Option<u32> {
    pgrep_stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse().ok())
}

#[cfg(unix)]
fn terminate(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid).map_err(io::Error::other)?;
    signal::kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::other)
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "graceful termination needs unix signals",
    ))
}
