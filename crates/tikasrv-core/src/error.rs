//! Error types for tikasrv-core.

use std::path::PathBuf;
use thiserror::Error;

use crate::context::ContextError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by downloads, handles and the process supervisor.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad input when building a server handle.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Version tag has no entry in the checksum table.
    #[error("unsupported Tika version: {0}")]
    UnsupportedVersion(String),

    /// Local file create/read/write/delete failed.
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Downloaded file failed verification and could not be removed.
    #[error("invalid md5: {actual}: error removing {}: {source}", path.display())]
    CleanupFailed {
        path: PathBuf,
        actual: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport failure or non-success HTTP status.
    #[error("unable to download {url:?}: {reason}")]
    Download { url: String, reason: String },

    /// Downloaded content hash disagrees with the table.
    #[error("invalid md5 for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The operation's context was cancelled or its deadline passed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The server process could not be launched.
    #[error("failed to start {program}: {source}")]
    FailedToStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The server never answered the readiness probe. `output` holds whatever
    /// the process wrote to stdout/stderr; `capture_error` is set when that
    /// output could not be collected.
    #[error("{}", readiness_message(url, cause, output, capture_error.as_deref()))]
    FailedReadiness {
        url: String,
        cause: ContextError,
        output: String,
        capture_error: Option<String>,
    },

    /// The server process exited before it became ready.
    #[error("server process exited before becoming ready ({status})\nserver output:\n\n{output}")]
    ExitedEarly { status: String, output: String },
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

fn readiness_message(
    url: &str,
    cause: &ContextError,
    output: &str,
    capture_error: Option<&str>,
) -> String {
    let mut msg = format!("error starting server at {}: {}", url, cause);
    if let Some(e) = capture_error {
        msg.push_str(&format!("\nerror reading output: {}", e));
    }
    msg.push_str(&format!("\nserver output:\n\n{}", output));
    msg
}
