//! `tikasrv download` – fetch and verify a server jar.

use anyhow::Result;
use std::path::PathBuf;
use tikasrv_core::config::TikaConfig;
use tikasrv_core::Context;

use super::interrupt::cancel_on_ctrl_c;

/// Default file name for a version tag.
pub(crate) fn default_jar_path(tag: &str) -> PathBuf {
    PathBuf::from(format!("tika-server-{}.jar", tag))
}

pub async fn run_download(cfg: &TikaConfig, tag: &str, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| default_jar_path(tag));
    let ctx = Context::background();
    let _interrupt = cancel_on_ctrl_c(&ctx);

    if let Err(err) = cfg.downloader().ensure(&ctx, tag, &path).await {
        if ctx.err().is_some() {
            anyhow::bail!("download of {} interrupted: {}", tag, err);
        }
        return Err(err.into());
    }

    println!("{}", path.display());
    Ok(())
}
