// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::{Error, Result};
use crate::perms::is_executable;
use log::debug;
use std::path::PathBuf;

/// Expand `patterns` in order and keep the matches the current user can execute.
///
/// Invalid patterns and unreadable entries are skipped. Fails when no pattern
/// matches anything, or when nothing that matched is executable.
pub fn find_executables<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        match glob::glob(pattern) {
            Ok(matches) => paths.extend(matches.filter_map(|m| match m {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!("skipping unreadable match for {pattern}: {e}");
                    None
                }
            })),
            Err(e) => debug!("skipping invalid glob {pattern}: {e}"),
        }
    }

    if paths.is_empty() {
        return Err(Error::NoMatchingPaths {
            patterns: owned(patterns),
        });
    }

    let mut execs = Vec::new();
    for path in paths {
        match is_executable(&path) {
            Ok(true) => execs.push(path),
            Ok(false) => debug!("not executable: {}", path.display()),
            Err(e @ Error::Stat { .. }) => debug!("skipping {}: {e}", path.display()),
            Err(e) => return Err(e),
        }
    }

    if execs.is_empty() {
        return Err(Error::NoMatchingExecutables {
            patterns: owned(patterns),
        });
    }
    Ok(execs)
}

/// First usable executable in pattern-then-match order.
pub fn find_executable<S: AsRef<str>>(patterns: &[S]) -> Result<PathBuf> {
    let mut execs = find_executables(patterns)?;
    Ok(execs.swap_remove(0))
}

fn owned<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns.iter().map(|p| p.as_ref().to_string()).collect()
}
