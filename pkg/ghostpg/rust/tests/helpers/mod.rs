// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use ghost_postgres::{Backoff, Config, find_executable};
use nix::unistd::geteuid;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Whether real PostgreSQL binaries can be used from this process.
///
/// `initdb` refuses to run as root, so root counts as unavailable.
pub fn postgres_available() -> bool {
    if geteuid().is_root() {
        eprintln!("skipping: running as root");
        return false;
    }
    let cfg = Config::default();
    let found = find_executable(&cfg.initdb_globs).is_ok()
        && find_executable(&cfg.postgres_globs).is_ok();
    if !found {
        eprintln!("skipping: initdb/postgres not installed");
    }
    found
}

/// Write an executable shell script named `name` into `dir`.
pub fn fake_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .unwrap_or_else(|e| panic!("failed to chmod {}: {e}", path.display()));
    path
}

/// A config whose `initdb` and `postgres` are shell scripts under `root`.
pub fn fake_config(root: &Path, initdb: &str, postgres: &str) -> Config {
    let bin = root.join("bin");
    let tmp = root.join("tmp");
    std::fs::create_dir_all(&bin).expect("failed to create bin dir");
    std::fs::create_dir_all(&tmp).expect("failed to create tmp dir");
    Config {
        initdb_globs: vec![fake_executable(&bin, "initdb", initdb).display().to_string()],
        postgres_globs: vec![fake_executable(&bin, "postgres", postgres).display().to_string()],
        tmp_dir: tmp,
        readiness: Backoff {
            min_delay_ms: 1,
            max_delay_ms: 16,
            factor: 2,
        },
        stop_grace_ms: 300,
        ..Config::default()
    }
}

/// Number of entries directly under `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
