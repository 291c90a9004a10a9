//! Workspace layout and the single-instance lock.
//!
//! All runtime data lives under one workspace root:
//!
//! ```text
//! <workspace>/data/<mode>/events.db
//! <workspace>/data/<mode>/snapshots/
//! <workspace>/logs/<mode>/
//! <workspace>/instance.lock
//! ```
//!
//! A local `_workspace` directory takes priority (portable/dev mode);
//! otherwise the OS-standard data directory is used.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

pub const APP_NAME: &str = "seqtape";

const LOCAL_WORKSPACE: &str = "_workspace";

/// Root directory for all runtime data.
pub fn workspace_dir() -> PathBuf {
    let local = Path::new(LOCAL_WORKSPACE);
    if local.exists() {
        return local.to_path_buf();
    }
    match dirs::data_dir() {
        Some(base) => base.join(APP_NAME),
        None => local.to_path_buf(),
    }
}

/// Locate the configuration file: working directory first, then the OS
/// config directory. The default path is returned even when nothing exists
/// yet, so the load error names the expected location.
pub fn resolve_config_path() -> PathBuf {
    let default = PathBuf::from("configs").join("config.toml");
    if default.exists() {
        return default;
    }
    if let Some(base) = dirs::config_dir() {
        let candidate = base.join(APP_NAME).join("config.toml");
        if candidate.exists() {
            return candidate;
        }
    }
    default
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory: {}", path.display()))
}

/// Exclusive lock preventing two instances from sharing one WAL. The file
/// holds the owner's PID for post-mortems; it is removed on drop.
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(workspace: &Path) -> Result<Self> {
        let path = workspace.join("instance.lock");
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => {
                use std::io::Write;
                let mut file = file;
                let _ = write!(file, "{}", std::process::id());
                info!(path = %path.display(), "instance lock acquired");
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                bail!(
                    "another instance is already running (lock file exists: {})",
                    path.display()
                );
            }
            Err(e) => Err(e).with_context(|| format!("create lock file: {}", path.display())),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
