//! Checksum-verified download of the Tika server jar.
//!
//! A download is skipped when the destination already carries the expected
//! MD5. Otherwise the jar is streamed with a single GET into the destination
//! and verified; a file that fails verification is removed.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

use crate::checksum::{self, Verification};
use crate::context::{Context, ContextError};
use crate::error::{Error, Result};
use crate::versions::{ChecksumTable, Version};

/// Maven Central location of the Tika artifacts.
pub const DEFAULT_REPOSITORY_BASE: &str = "https://repo1.maven.org/maven2/org/apache/tika";

/// Downloads Tika server jars from a Maven-layout repository.
#[derive(Debug, Clone)]
pub struct Downloader {
    repository_base: String,
    checksums: ChecksumTable,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            repository_base: DEFAULT_REPOSITORY_BASE.to_string(),
            checksums: ChecksumTable::default(),
        }
    }

    /// Use another repository (mirror, proxy, test server).
    pub fn with_repository_base(mut self, base: impl Into<String>) -> Self {
        self.repository_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_checksums(mut self, checksums: ChecksumTable) -> Self {
        self.checksums = checksums;
        self
    }

    pub fn checksums(&self) -> &ChecksumTable {
        &self.checksums
    }

    /// `<repository-base>/tika-server/<tag>/tika-server-<tag>.jar`
    pub fn artifact_url(&self, tag: &str) -> String {
        format!(
            "{}/tika-server/{tag}/tika-server-{tag}.jar",
            self.repository_base,
            tag = tag
        )
    }

    /// Makes sure `dest` holds the jar for `tag` with the expected checksum.
    ///
    /// Returns immediately when the file is already valid. On a checksum
    /// mismatch after download the file is deleted. Transport failures leave
    /// the partially written file in place for inspection.
    pub async fn ensure(&self, ctx: &Context, tag: &str, dest: &Path) -> Result<()> {
        let expected = self.checksums.expected(tag)?.to_string();

        if dest.exists() && verify(dest, &expected).await.is_match() {
            debug!(version = %tag, path = %dest.display(), "existing download is valid, skipping");
            return Ok(());
        }

        let file = create(dest).await?;
        let url = self.artifact_url(tag);
        info!(version = %tag, %url, path = %dest.display(), "downloading tika server");

        let written = fetch(ctx, &url, file, dest).await?;

        match verify(dest, &expected).await {
            Verification::Match => {
                info!(bytes = written, path = %dest.display(), "download verified");
                Ok(())
            }
            Verification::Mismatch { actual } => Err(discard_invalid(dest, expected, actual)),
            Verification::Unreadable(_) => Err(discard_invalid(dest, expected, String::new())),
        }
    }

    /// Typed form of [`Downloader::ensure`].
    pub async fn ensure_version(&self, ctx: &Context, version: Version, dest: &Path) -> Result<()> {
        self.ensure(ctx, version.as_str(), dest).await
    }
}

/// Downloads and verifies `version` at `path` from Maven Central.
pub async fn ensure(ctx: &Context, version: Version, path: &Path) -> Result<()> {
    Downloader::new().ensure_version(ctx, version, path).await
}

async fn create(dest: &Path) -> Result<File> {
    let path = dest.to_path_buf();
    tokio::task::spawn_blocking(move || File::create(&path))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .and_then(|created| created)
        .map_err(|e| Error::io("create", dest, e))
}

/// Removes a download that failed verification. The returned error is the
/// mismatch, or the removal failure carrying the actual digest.
fn discard_invalid(dest: &Path, expected: String, actual: String) -> Error {
    if let Err(source) = std::fs::remove_file(dest) {
        warn!(path = %dest.display(), error = %source, "could not remove invalid download");
        return Error::CleanupFailed {
            path: dest.to_path_buf(),
            actual,
            source,
        };
    }
    Error::ChecksumMismatch {
        path: dest.to_path_buf(),
        expected,
        actual,
    }
}

async fn verify(path: &Path, expected: &str) -> Verification {
    let path = path.to_path_buf();
    let expected = expected.to_string();
    tokio::task::spawn_blocking(move || checksum::verify_md5(&path, &expected))
        .await
        .unwrap_or_else(|e| Verification::Unreadable(io::Error::new(io::ErrorKind::Other, e)))
}

#[derive(Debug, ThisError)]
enum FetchError {
    #[error("transfer aborted")]
    Aborted,
    #[error("{0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("write: {0}")]
    Write(io::Error),
}

/// Sets the abort flag when dropped.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Runs the blocking GET on another thread. Cancelling `ctx` or dropping the
/// returned future flips the abort flag checked by the curl progress callback.
async fn fetch(ctx: &Context, url: &str, file: File, dest: &Path) -> Result<u64> {
    if let Some(err) = ctx.err() {
        return Err(err.into());
    }
    let abort = Arc::new(AtomicBool::new(false));
    let mut transfer = tokio::task::spawn_blocking({
        let url = url.to_string();
        let abort = Arc::clone(&abort);
        move || fetch_blocking(&url, file, &abort)
    });
    let _abort_guard = AbortOnDrop(Arc::clone(&abort));

    let joined = tokio::select! {
        joined = &mut transfer => joined,
        err = ctx.done() => {
            abort.store(true, Ordering::Relaxed);
            let _ = transfer.await;
            return Err(err.into());
        }
    };

    let result = joined.map_err(|e| Error::Download {
        url: url.to_string(),
        reason: format!("download task join: {}", e),
    })?;

    result.map_err(|e| match e {
        FetchError::Aborted => Error::Context(ctx.err().unwrap_or(ContextError::Canceled)),
        FetchError::Write(source) => Error::io("write", PathBuf::from(dest), source),
        other => Error::Download {
            url: url.to_string(),
            reason: other.to_string(),
        },
    })
}

fn fetch_blocking(url: &str, file: File, abort: &AtomicBool) -> std::result::Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut written: u64 = 0;
    let mut write_error: Option<io::Error> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.fail_on_error(true)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.progress(true)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match writer.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                write_error = Some(e);
                Ok(0) // abort transfer
            }
        })?;
        transfer.progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if e.is_aborted_by_callback() {
            return Err(FetchError::Aborted);
        }
        if e.is_write_error() {
            if let Some(io_err) = write_error.take() {
                return Err(FetchError::Write(io_err));
            }
        }
        if e.is_http_returned_error() {
            let code = easy.response_code()?;
            return Err(FetchError::Http(code));
        }
        return Err(FetchError::Curl(e));
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }

    let file = writer
        .into_inner()
        .map_err(|e| FetchError::Write(e.into_error()))?;
    file.sync_all().map_err(FetchError::Write)?;
    Ok(written)
}
