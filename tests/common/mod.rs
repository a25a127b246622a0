//! Common test utilities for proctools tests

#![allow(dead_code)]

use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a temporary directory holding an executable script
pub fn create_script_project(script_name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let script_path = dir.path().join(script_name);
    std::fs::write(&script_path, content).expect("Failed to write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&script_path)
            .expect("Failed to get metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script_path, perms).expect("Failed to set permissions");
    }

    let path = dir.path().to_path_buf();
    (dir, path)
}

/// Whether a POSIX shell is available to run the script fixtures
pub fn has_sh() -> bool {
    which::which("sh").is_ok()
}

/// Script that echoes its arguments one per line, then exits with $EXIT_CODE
pub const ARGS_SCRIPT: &str = r#"#!/bin/sh
for arg in "$@"; do
    echo "$arg"
done
echo "cwd=$(pwd)" >&2
exit "${EXIT_CODE:-0}"
"#;

/// Script that writes more than a pipe buffer before exiting
pub const FLOOD_SCRIPT: &str = r#"#!/bin/sh
i=0
while [ $i -lt 50000 ]; do
    echo "line $i"
    i=$((i+1))
done
"#;

/// Script that sleeps long enough to be killed
pub const SLEEPER_SCRIPT: &str = r#"#!/bin/sh
echo started
exec sleep 60
"#;
