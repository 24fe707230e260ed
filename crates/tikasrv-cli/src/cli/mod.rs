//! CLI for tikasrv.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tikasrv_core::config;

use commands::{run_checksum, run_download, run_serve, run_versions};

/// Top-level CLI for tikasrv.
#[derive(Debug, Parser)]
#[command(name = "tikasrv")]
#[command(about = "tikasrv: fetch, verify and run an Apache Tika server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download and verify a Tika server jar (skipped if already valid).
    Download {
        /// Version tag, e.g. 1.16.
        #[arg(long = "version", default_value = "1.16", value_name = "TAG")]
        tag: String,
        /// Destination path (default: ./tika-server-<TAG>.jar).
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Start a Tika server, wait until it is ready and run until Ctrl-C.
    Serve {
        /// Server jar or executable.
        #[arg(long)]
        jar: PathBuf,
        /// Port to bind (default from config, 9998).
        #[arg(long, default_value = "")]
        port: String,
        /// Seconds to wait for readiness (default from config).
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Compute the MD5 (or SHA-256) of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// Print SHA-256 instead of MD5.
        #[arg(long)]
        sha256: bool,
    },

    /// List supported versions and their expected MD5.
    Versions,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Download { tag, path } => run_download(&cfg, &tag, path).await?,
            CliCommand::Serve {
                jar,
                port,
                timeout_secs,
            } => run_serve(&cfg, jar, &port, timeout_secs).await?,
            CliCommand::Checksum { path, sha256 } => run_checksum(&path, sha256).await?,
            CliCommand::Versions => run_versions(&cfg),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
