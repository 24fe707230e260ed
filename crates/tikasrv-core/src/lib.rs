pub mod config;
pub mod logging;

pub mod checksum;
pub mod context;
pub mod download;
pub mod error;
pub mod handle;
pub mod probe;
pub mod supervisor;
pub mod versions;

pub use context::{Context, ContextError};
pub use download::Downloader;
pub use error::{Error, Result};
pub use handle::ServerHandle;
pub use probe::{Prober, ReadinessProbe, VersionClient};
pub use supervisor::{RunningServer, ServerExit, Supervisor};
pub use versions::{ChecksumTable, Version};
