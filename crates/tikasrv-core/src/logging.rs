//! Logging init: append to a file under the XDG state dir, or to stderr when
//! that is not possible.

use anyhow::{Context as _, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tikasrv=debug,tikasrv_core=debug";

/// `~/.local/state/tikasrv/tikasrv.log`
pub fn log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tikasrv")?;
    Ok(xdg_dirs.get_state_home().join("tikasrv.log"))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

fn install(writer: BoxMakeWriter) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
}

/// Logs to [`log_path`]. Returns Err when the file cannot be opened or a
/// subscriber is already set, so the caller can fall back to stderr.
pub fn init_logging() -> Result<PathBuf> {
    let path = log_path()?;
    let file = open_log_file(&path)?;
    install(BoxMakeWriter::new(Mutex::new(file)))?;
    tracing::info!("tikasrv logging initialized at {}", path.display());
    Ok(path)
}

/// Logs to stderr only.
pub fn init_logging_stderr() {
    let _ = install(BoxMakeWriter::new(std::io::stderr));
}
