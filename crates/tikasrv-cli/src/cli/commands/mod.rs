//! CLI command handlers, one per file.

mod checksum;
mod download;
mod interrupt;
mod serve;
mod versions;

pub use checksum::run_checksum;
pub use download::run_download;
#[cfg(test)]
pub(crate) use download::default_jar_path;
pub use serve::run_serve;
pub use versions::run_versions;
