//! Supported Tika server versions and their expected MD5 checksums.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// A Tika server release with a known checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    V1_14,
    V1_15,
    #[default]
    V1_16,
}

impl Version {
    pub const ALL: [Version; 3] = [Version::V1_14, Version::V1_15, Version::V1_16];

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V1_14 => "1.14",
            Version::V1_15 => "1.15",
            Version::V1_16 => "1.16",
        }
    }

    /// Expected MD5 of `tika-server-<version>.jar`.
    pub fn md5(&self) -> &'static str {
        match self {
            Version::V1_14 => "39055fc71358d774b9da066f80b1141c",
            Version::V1_15 => "80bd3f00f05326d5190466de27d593dd",
            Version::V1_16 => "6a549ce6ef6e186e019766059fd82fb2",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::UnsupportedVersion(s.to_string()))
    }
}

/// Version tag -> expected MD5. Starts from the built-in releases; extra
/// tags (e.g. from `pinned_versions` in the config) can be added but never
/// replace a built-in entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumTable {
    entries: BTreeMap<String, String>,
}

impl ChecksumTable {
    /// The process-wide table of built-in releases.
    pub fn builtin() -> &'static ChecksumTable {
        static TABLE: OnceLock<ChecksumTable> = OnceLock::new();
        TABLE.get_or_init(|| ChecksumTable {
            entries: Version::ALL
                .iter()
                .map(|v| (v.as_str().to_string(), v.md5().to_string()))
                .collect(),
        })
    }

    /// Adds `tag` unless it is already present. Returns false if skipped.
    pub fn pin(&mut self, tag: impl Into<String>, md5: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.entries.contains_key(&tag) {
            tracing::warn!(%tag, "ignoring pinned checksum for a version already in the table");
            return false;
        }
        self.entries.insert(tag, md5.into().to_ascii_lowercase());
        true
    }

    /// Expected MD5 for `tag`; `UnsupportedVersion` if the tag is unknown.
    pub fn expected(&self, tag: &str) -> Result<&str> {
        self.entries
            .get(tag)
            .map(String::as_str)
            .ok_or_else(|| Error::UnsupportedVersion(tag.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for ChecksumTable {
    fn default() -> Self {
        Self::builtin().clone()
    }
}
