//! `tikasrv versions` – list known versions and checksums.

use tikasrv_core::config::TikaConfig;

pub fn run_versions(cfg: &TikaConfig) {
    for (tag, md5) in cfg.checksum_table().iter() {
        println!("{:<8} {}", tag, md5);
    }
}
