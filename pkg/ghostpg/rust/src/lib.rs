// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Ephemeral PostgreSQL servers for test suites.
//!
//! [`GhostPostgres`] finds `initdb` and `postgres` on the host, initializes a
//! throwaway data directory, starts the server on a free port, waits for it
//! to accept connections and creates the test database. `terminate` shuts it
//! down and removes every file it created.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod backoff;
pub mod config;
mod controller;
mod errors;
pub mod locate;
pub mod perms;
pub mod process;
mod sink;
mod state;

pub use backoff::{Backoff, wait_ready};
pub use config::{Config, config_path, free_port, load_config};
pub use controller::GhostPostgres;
pub use errors::{Error, Result};
pub use locate::{find_executable, find_executables};
pub use perms::is_executable;
pub use process::ServerProcess;
pub use sink::{LogSink, SERVER_LOG_TARGET};
pub use state::ProcessState;

pub use tokio_postgres;
