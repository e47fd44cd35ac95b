// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    // Discovery
    #[error("could not find any matching paths for globs: {patterns:?}")]
    NoMatchingPaths { patterns: Vec<String> },
    #[error("could not find any matching executables for globs: {patterns:?}")]
    NoMatchingExecutables { patterns: Vec<String> },

    // Permission checks
    #[error("could not stat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
    #[error("could not resolve group memberships: {0}")]
    GroupLookup(#[source] nix::Error),
    #[error("could not resolve current user (uid={uid})")]
    UserLookup { uid: u32 },

    // Data directory
    #[error("data directory has not been initialized")]
    DirectoryNotInitialized,
    #[error("could not create data directory under {root}: {source}")]
    CreateDirectory { root: PathBuf, source: io::Error },
    #[error("could not remove data directory {path}: {source}")]
    RemoveDirectory { path: PathBuf, source: io::Error },

    // Process start
    #[error("could not allocate a free port: {0}")]
    PortAllocation(#[source] io::Error),
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: PathBuf, source: io::Error },
    #[error("{program} failed with {status}")]
    Exit { program: PathBuf, status: ExitStatus },
    #[error("{program} exited with {status} before it could be recorded as running")]
    ExitedDuringStartup { program: PathBuf, status: ExitStatus },

    // Readiness
    #[error("server not ready after backoff reached {max_delay:?}: {source}")]
    NotReady {
        max_delay: Duration,
        source: Box<Error>,
    },
    #[error("readiness probe did not complete within {0:?}")]
    ProbeTimeout(Duration),

    // Process stop
    #[error("failed to signal pid {pid}: {source}")]
    Signal { pid: i32, source: nix::Error },
    #[error("failed to wait on process: {0}")]
    Wait(#[source] io::Error),
    #[error("process did not exit within {0:?}")]
    StopTimeout(Duration),

    #[error(transparent)]
    Database(#[from] tokio_postgres::Error),
}

impl Error {
    /// True for the two executable-discovery failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NoMatchingPaths { .. } | Error::NoMatchingExecutables { .. }
        )
    }
}
