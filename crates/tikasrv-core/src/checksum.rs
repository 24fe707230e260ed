//! File checksums: MD5 for artifact verification, SHA-256 for the CLI.
//!
//! Files are read sequentially in fixed-size chunks so large jars never sit
//! in memory.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Outcome of checking a file against an expected digest.
#[derive(Debug)]
pub enum Verification {
    /// Digest equals the expected value.
    Match,
    /// File was read; its digest differs.
    Mismatch { actual: String },
    /// File could not be opened or read.
    Unreadable(io::Error),
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match)
    }
}

fn digest_path<D: Digest>(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute MD5 of a file and return the digest as lowercase hex.
pub fn md5_path(path: &Path) -> io::Result<String> {
    digest_path::<Md5>(path)
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> io::Result<String> {
    digest_path::<Sha256>(path)
}

/// Checks the MD5 of `path` against `expected` (case-insensitive hex).
pub fn verify_md5(path: &Path, expected: &str) -> Verification {
    match md5_path(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected) => Verification::Match,
        Ok(actual) => Verification::Mismatch { actual },
        Err(e) => Verification::Unreadable(e),
    }
}

/// Boolean form of [`verify_md5`]: `(matches, actual)`, with `(false, "")`
/// when the file could not be read.
pub fn compute_and_compare(path: &Path, expected: &str) -> (bool, String) {
    match verify_md5(path, expected) {
        Verification::Match => (true, expected.to_ascii_lowercase()),
        Verification::Mismatch { actual } => (false, actual),
        Verification::Unreadable(_) => (false, String::new()),
    }
}
