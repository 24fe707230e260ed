//! Identity of one Tika server instance: binary, port and base URL.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};

/// Port used when none is given.
pub const DEFAULT_PORT: &str = "9998";

/// Launcher for `.jar` binaries when none is configured.
pub const DEFAULT_JAVA: &str = "java";

/// Where and how to run a server. Does not imply the server is running; see
/// [`crate::supervisor::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    binary: PathBuf,
    port: String,
    url: String,
    java: PathBuf,
}

impl ServerHandle {
    /// Builds a handle for `binary` listening on `port` (`9998` if empty).
    pub fn new(binary: impl Into<PathBuf>, port: &str) -> Result<Self> {
        let binary = binary.into();
        if binary.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("no server binary specified".to_string()));
        }
        let port = if port.is_empty() { DEFAULT_PORT } else { port };
        let url = Url::parse(&format!("http://localhost:{}", port))
            .map_err(|e| Error::InvalidArgument(format!("invalid port {:?}: {}", port, e)))?;
        Ok(Self {
            binary,
            port: port.to_string(),
            url: url.as_str().trim_end_matches('/').to_string(),
            java: PathBuf::from(DEFAULT_JAVA),
        })
    }

    /// Java executable used to run `.jar` binaries.
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Base URL, e.g. `http://localhost:9998`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Program and arguments that start this server.
    ///
    /// Jars run as `<java> -jar <jar> -p <port>`, anything else as
    /// `<binary> -p <port>`.
    pub fn command_line(&self) -> (OsString, Vec<OsString>) {
        let is_jar = self
            .binary
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("jar"));
        let port_args = [OsString::from("-p"), OsString::from(&self.port)];
        if is_jar {
            let mut args = vec![OsString::from("-jar"), self.binary.clone().into_os_string()];
            args.extend(port_args);
            (self.java.clone().into_os_string(), args)
        } else {
            (self.binary.clone().into_os_string(), port_args.to_vec())
        }
    }
}
