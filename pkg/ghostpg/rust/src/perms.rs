// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::{Error, Result};
use nix::unistd::{getegid, getgroups};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

const USER_EXEC: u32 = 0o100;
const GROUP_EXEC: u32 = 0o010;
const OTHER_EXEC: u32 = 0o001;

/// Whether the current process may execute the file at `path`.
///
/// Checked in order: other bit, group bit with a matching group membership,
/// user bit with a matching owner. Directories are never executable here.
/// Identity lookup failures are reported rather than treated as "no".
pub fn is_executable(path: &Path) -> Result<bool> {
    let meta = std::fs::metadata(path).map_err(|source| Error::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    if meta.is_dir() {
        return Ok(false);
    }
    let mode = meta.mode();

    if mode & OTHER_EXEC != 0 {
        return Ok(true);
    }

    if mode & GROUP_EXEC != 0 && in_group(meta.gid())? {
        return Ok(true);
    }

    if mode & USER_EXEC != 0 && meta.uid() == current_uid()? {
        return Ok(true);
    }

    Ok(false)
}

fn in_group(gid: u32) -> Result<bool> {
    if getegid().as_raw() == gid {
        return Ok(true);
    }
    let groups = getgroups().map_err(Error::GroupLookup)?;
    Ok(groups.iter().any(|g| g.as_raw() == gid))
}

fn current_uid() -> Result<u32> {
    let uid = uzers::get_current_uid();
    match uzers::get_user_by_uid(uid) {
        Some(user) => Ok(user.uid()),
        None => Err(Error::UserLookup { uid }),
    }
}
