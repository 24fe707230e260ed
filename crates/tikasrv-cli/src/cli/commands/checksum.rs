//! Checksum command: compute MD5 or SHA-256 of a file.

use anyhow::{Context, Result};
use std::path::Path;
use tikasrv_core::checksum;

/// Compute and print the digest of the given file.
pub async fn run_checksum(path: &Path, sha256: bool) -> Result<()> {
    let digest = if sha256 {
        checksum::sha256_path(path)
    } else {
        checksum::md5_path(path)
    }
    .with_context(|| format!("read {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
