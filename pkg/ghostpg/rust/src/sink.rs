// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// `log` target used when subprocess output is forwarded to the log facade.
pub const SERVER_LOG_TARGET: &str = "ghost_postgres::server";

/// Destination for the output of `initdb` and `postgres`.
#[derive(Clone, Default)]
pub enum LogSink {
    /// Drop every line.
    #[default]
    Discard,
    /// Forward each line through the `log` facade at `level`.
    Log { level: log::Level },
    /// Append each line, newline-terminated, to a shared writer.
    Writer(Arc<Mutex<dyn Write + Send>>),
}

impl LogSink {
    pub fn write_line(&self, line: &str) {
        match self {
            LogSink::Discard => {}
            LogSink::Log { level } => log::log!(target: SERVER_LOG_TARGET, *level, "{line}"),
            LogSink::Writer(w) => {
                if let Ok(mut w) = w.lock() {
                    // A broken sink must never take the server down with it.
                    let _ = writeln!(w, "{line}");
                }
            }
        }
    }

    /// Forward every line of a captured output buffer.
    pub fn write_output(&self, output: &[u8]) {
        if matches!(self, LogSink::Discard) {
            return;
        }
        for line in String::from_utf8_lossy(output).lines() {
            self.write_line(line);
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSink::Discard => write!(f, "Discard"),
            LogSink::Log { level } => write!(f, "Log({level})"),
            LogSink::Writer(_) => write!(f, "Writer"),
        }
    }
}
