//! `tikasrv serve` – start a server and keep it running until Ctrl-C.

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::time::Duration;
use tikasrv_core::config::TikaConfig;
use tikasrv_core::Context;

use super::interrupt::cancel_on_ctrl_c;

pub async fn run_serve(
    cfg: &TikaConfig,
    jar: PathBuf,
    port: &str,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let handle = cfg.server_handle(jar, port)?;
    let timeout = timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| cfg.startup_timeout());

    let root = Context::background();
    let _interrupt = cancel_on_ctrl_c(&root);
    let supervisor = cfg.supervisor().with_startup_timeout(timeout);

    let server = supervisor
        .start(&root, &handle)
        .await
        .with_context(|| format!("start server {}", handle.binary().display()))?;

    println!("tika server ready at {}", server.url());
    root.done().await;
    tracing::info!("shutting down");

    let exit = server.shutdown().await?;
    tracing::debug!(status = ?exit.status, "server stopped");
    Ok(())
}
