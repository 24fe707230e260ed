//! Fake server executables for supervisor tests (Unix only).
//!
//! Each script accepts `-p <port>` like the real server, records its PID in
//! `<dir>/pid` and then behaves as requested.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Writes an executable script `<dir>/<name>` whose body runs after the PID
/// has been recorded.
pub fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let pid_file = dir.join("pid");
    let script = format!(
        "#!/bin/sh\necho $$ > '{}'\n{}\n",
        pid_file.display(),
        body
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script that prints a line on each stream and then sleeps without exiting.
pub fn long_running(dir: &Path) -> PathBuf {
    write(
        dir,
        "fake-server",
        "echo \"listening on port $2\"\necho 'warming up' >&2\nexec sleep 30",
    )
}

/// Script that prints an error and exits immediately with status 3.
pub fn crashing(dir: &Path) -> PathBuf {
    write(dir, "crashing-server", "echo 'Address already in use' >&2\nexit 3")
}

pub fn recorded_pid(dir: &Path) -> Option<u32> {
    fs::read_to_string(dir.join("pid"))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// True if a process with `pid` still exists.
pub fn is_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
