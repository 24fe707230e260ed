use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::download::{Downloader, DEFAULT_REPOSITORY_BASE};
use crate::handle::{ServerHandle, DEFAULT_JAVA, DEFAULT_PORT};
use crate::probe::{Prober, VersionClient};
use crate::supervisor::Supervisor;
use crate::versions::ChecksumTable;

/// Global configuration loaded from `~/.config/tikasrv/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TikaConfig {
    /// Port the server listens on.
    pub port: String,
    /// Java executable used to run `.jar` servers.
    pub java_path: String,
    /// Maven-layout repository that hosts `tika-server/<v>/tika-server-<v>.jar`.
    pub repository_base: String,
    /// Interval between readiness probes, in milliseconds.
    pub poll_interval_ms: u64,
    /// How long `serve` waits for the server to become ready.
    pub startup_timeout_secs: u64,
    /// Timeout of a single readiness request, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Extra version tags and their MD5, for releases newer than the built-in table.
    #[serde(default)]
    pub pinned_versions: BTreeMap<String, String>,
}

impl Default for TikaConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            java_path: DEFAULT_JAVA.to_string(),
            repository_base: DEFAULT_REPOSITORY_BASE.to_string(),
            poll_interval_ms: 500,
            startup_timeout_secs: 60,
            probe_timeout_ms: 2000,
            pinned_versions: BTreeMap::new(),
        }
    }
}

impl TikaConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Built-in checksums plus `pinned_versions`.
    pub fn checksum_table(&self) -> ChecksumTable {
        let mut table = ChecksumTable::default();
        for (tag, md5) in &self.pinned_versions {
            table.pin(tag.clone(), md5.clone());
        }
        table
    }

    pub fn downloader(&self) -> Downloader {
        Downloader::new()
            .with_repository_base(self.repository_base.clone())
            .with_checksums(self.checksum_table())
    }

    /// Handle for `binary`; an empty `port` falls back to the configured one.
    pub fn server_handle(&self, binary: impl Into<PathBuf>, port: &str) -> crate::Result<ServerHandle> {
        let port = if port.is_empty() { self.port.as_str() } else { port };
        Ok(ServerHandle::new(binary, port)?.with_java(&self.java_path))
    }

    pub fn supervisor(&self) -> Supervisor<VersionClient> {
        let client = VersionClient::new(Duration::from_millis(self.probe_timeout_ms));
        Supervisor::new(
            Prober::new(client).with_interval(Duration::from_millis(self.poll_interval_ms)),
        )
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tikasrv")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TikaConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TikaConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TikaConfig = toml::from_str(&data)?;
    Ok(cfg)
}
