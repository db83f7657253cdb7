//! Advisory project lock.
//!
//! One lock file per project at `.tui-wbs/.lock` containing the holder
//! pid and an RFC 3339 timestamp, one per line. A lock whose contents
//! do not parse, whose pid is dead, or whose timestamp is older than
//! one hour is stale and gets taken over with a warning.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::CONFIG_DIR;
use crate::models::{ParseWarning, WarningKind};
use crate::{Error, Result};

/// A lock older than this is stale even if its pid is alive.
pub const MAX_LOCK_AGE_SECS: i64 = 3600;

const LOCK_FILE: &str = ".lock";

/// Path of the lock file for a project directory.
pub fn lock_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(LOCK_FILE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LockContents {
    pid: u32,
    timestamp: DateTime<Local>,
}

fn parse_contents(text: &str) -> Option<LockContents> {
    let mut lines = text.lines();
    let pid: u32 = lines.next()?.trim().parse().ok()?;
    let timestamp = DateTime::parse_from_rfc3339(lines.next()?.trim())
        .ok()?
        .with_timezone(&Local);
    Some(LockContents { pid, timestamp })
}

/// True when a process with this pid is alive on this host. Without a
/// signal-0 probe (non-Unix), a live pid is assumed and only the
/// timestamp decides staleness.
#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    true
}

fn is_stale(contents: Option<LockContents>) -> bool {
    match contents {
        None => true,
        Some(c) => {
            !pid_alive(c.pid)
                || (Local::now() - c.timestamp).num_seconds() > MAX_LOCK_AGE_SECS
        }
    }
}

/// An advisory lock held by this process.
#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
    pid: u32,
}

impl ProjectLock {
    /// Acquire the lock for a project directory.
    ///
    /// Returns the lock plus a takeover warning when a stale lock had
    /// to be removed first. A live foreign lock is `Locked { pid }`.
    pub fn acquire(project_dir: &Path) -> Result<(Self, Option<ParseWarning>)> {
        let path = lock_path(project_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pid = std::process::id();

        match Self::try_create(&path, pid) {
            Ok(()) => Ok((ProjectLock { path, pid }, None)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let contents = fs::read_to_string(&path)
                    .ok()
                    .and_then(|text| parse_contents(&text));
                if let Some(c) = contents
                    && c.pid == pid
                {
                    // Re-acquiring our own lock refreshes the timestamp.
                    Self::write_contents(&path, pid)?;
                    return Ok((ProjectLock { path, pid }, None));
                }
                if !is_stale(contents) {
                    return Err(Error::Locked {
                        pid: contents.map(|c| c.pid).unwrap_or_default(),
                    });
                }
                let holder = contents.map(|c| c.pid).unwrap_or_default();
                fs::remove_file(&path)?;
                Self::try_create(&path, pid).map_err(Error::Io)?;
                let warning = ParseWarning::new(
                    WarningKind::StaleLockTakenOver,
                    path.display().to_string(),
                    0,
                    format!("Stale lock from pid {} taken over", holder),
                );
                Ok((ProjectLock { path, pid }, Some(warning)))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn try_create(path: &Path, pid: u32) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(Self::contents_for(pid).as_bytes())?;
        file.sync_all()
    }

    fn write_contents(path: &Path, pid: u32) -> Result<()> {
        fs::write(path, Self::contents_for(pid))?;
        Ok(())
    }

    fn contents_for(pid: u32) -> String {
        format!("{}\n{}\n", pid, Local::now().to_rfc3339())
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Confirm the lock is still ours before writing. A missing file
    /// or a foreign pid is `LockLost`.
    pub fn verify(&self) -> Result<()> {
        let text = fs::read_to_string(&self.path).map_err(|_| Error::LockLost)?;
        match parse_contents(&text) {
            Some(c) if c.pid == self.pid => Ok(()),
            _ => Err(Error::LockLost),
        }
    }

    /// Release the lock, deleting the file only while it is still ours.
    pub fn release(self) -> Result<()> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                if parse_contents(&text).is_some_and(|c| c.pid == self.pid) {
                    fs::remove_file(&self.path)?;
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
