//! Inter-process store lock.
//!
//! The lock is an exclusively-created file containing the owner's PID as
//! text. Contending processes probe the recorded PID with a null signal
//! (`kill(pid, None)`): a dead owner means the lock is stale and gets
//! removed, a live owner means we sleep and retry until the timeout.
//!
//! The PID probe is a heuristic. A recycled PID can make a stale lock
//! look held, in which case acquisition falls through to the timeout
//! instead of recovering early; it never removes a lock whose owner is
//! still running.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::{MetisError, Result};

/// Held store lock. Dropping it releases the lock file.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    /// Acquire the lock at `path`, waiting up to the configured timeout.
    ///
    /// Fails with [`MetisError::LockTimeout`] when a live owner holds the
    /// lock for the whole window. This is the one failure that must reach
    /// the caller loudly: writing without the lock risks corrupting the
    /// shared stores.
    pub fn acquire(path: &Path, config: &LockConfig) -> Result<StoreLock> {
        let started = Instant::now();
        let timeout = Duration::from_millis(config.timeout_ms);
        let retry = Duration::from_millis(config.retry_interval_ms);

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    file.write_all(std::process::id().to_string().as_bytes())?;
                    file.sync_all()?;
                    debug!(path = %path.display(), "store lock acquired");
                    return Ok(StoreLock {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let owner = read_owner_pid(path);
                    let mut stale_removed = false;
                    if let Some(pid) = owner {
                        if !process_alive(pid) {
                            warn!(path = %path.display(), owner = pid, "removing stale lock from dead process");
                            // Two processes can race this removal; create_new
                            // arbitrates whoever recreates the file first.
                            match fs::remove_file(path) {
                                Ok(()) => stale_removed = true,
                                Err(err) if err.kind() == ErrorKind::NotFound => {
                                    stale_removed = true;
                                }
                                Err(err) => {
                                    warn!(path = %path.display(), error = %err, "could not remove stale lock");
                                }
                            }
                        }
                    }
                    // The timeout gate applies to every retry, stale
                    // recovery included; a lock that cannot be removed
                    // times out instead of spinning.
                    if started.elapsed() >= timeout {
                        return Err(MetisError::LockTimeout {
                            path: path.to_path_buf(),
                            waited_ms: started.elapsed().as_millis() as u64,
                            owner,
                        });
                    }
                    if !stale_removed {
                        thread::sleep(retry);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "could not release store lock");
            }
        }
    }
}

fn read_owner_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Null-signal liveness probe. `ESRCH` is the only definitive "gone";
/// `EPERM` means the process exists but belongs to someone else, and
/// any other error is treated as alive so we never steal a held lock.
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}
