// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::{Error, Result};
use crate::sink::LogSink;
use crate::state::ProcessState;
use log::{debug, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

/// Upper bound on waiting for the output forwarder to drain after exit.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// A long-running child whose merged output is forwarded to a `LogSink`.
pub struct ServerProcess {
    pub name: String,
    program: PathBuf,
    args: Vec<OsString>,
    child: Option<Child>,
    pid: Option<i32>,
    state: ProcessState,
    forwarder: Option<JoinHandle<()>>,
}

impl ServerProcess {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        args: Vec<OsString>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            child: None,
            pid: None,
            state: ProcessState::NotStarted,
            forwarder: None,
        }
    }

    /// Launch the child and start forwarding its output.
    ///
    /// Returns as soon as the OS has started the process; it is not
    /// necessarily ready to serve yet. Must be called within a Tokio runtime.
    pub fn spawn(&mut self, sink: LogSink) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let pid = child.id().and_then(|p| i32::try_from(p).ok());
        info!(
            "[{}] spawned (pid={}, cmd={})",
            self.name,
            pid.unwrap_or(0),
            self.program.display()
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        self.forwarder = Some(tokio::spawn(forward_output(
            self.name.clone(),
            stdout,
            stderr,
            sink,
        )));
        self.child = Some(child);
        self.pid = pid;
        self.transition(ProcessState::Running);
        Ok(())
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_alive()
    }

    /// Exit status if the child has already exited, without blocking.
    ///
    /// An exited child is reaped and its output flushed, leaving the process
    /// in [`ProcessState::Exited`].
    pub async fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let Some(status) = child.try_wait().map_err(Error::Wait)? else {
            return Ok(None);
        };
        info!("[{}] exited with {status}", self.name);
        self.child = None;
        self.transition(ProcessState::Exited);
        self.flush().await;
        Ok(Some(status))
    }

    /// Interrupt the child, then kill it if it has not exited within `grace`.
    ///
    /// A no-op when nothing is running. Signal or wait failures are returned
    /// as-is after a best-effort kill; a timeout is reported as
    /// [`Error::StopTimeout`] once the kill has taken effect.
    pub async fn stop(&mut self, grace: Duration) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let result = match self.interrupt() {
            Err(e) => Err(e),
            Ok(()) => match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!("[{}] exited with {status}", self.name);
                    Ok(())
                }
                Ok(Err(e)) => Err(Error::Wait(e)),
                Err(_) => Err(Error::StopTimeout(grace)),
            },
        };

        match result {
            Ok(()) => self.transition(ProcessState::Exited),
            Err(ref e) => {
                warn!("[{}] {e}, sending SIGKILL", self.name);
                if let Err(kill_err) = child.kill().await {
                    debug!("[{}] kill failed: {kill_err}", self.name);
                }
                self.transition(ProcessState::Killed);
            }
        }

        self.flush().await;
        result
    }

    fn interrupt(&self) -> Result<()> {
        let Some(pid) = self.pid else {
            return Ok(());
        };
        info!("[{}] sending SIGINT", self.name);
        signal::kill(Pid::from_raw(pid), Signal::SIGINT)
            .map_err(|source| Error::Signal { pid, source })
    }

    async fn flush(&mut self) {
        if let Some(forwarder) = self.forwarder.take()
            && timeout(FLUSH_TIMEOUT, forwarder).await.is_err()
        {
            debug!("[{}] output still open after exit, detaching", self.name);
        }
    }

    fn transition(&mut self, next: ProcessState) {
        if !self.state.can_transition_to(next) {
            warn!("[{}] unexpected transition {} -> {next}", self.name, self.state);
        }
        self.state = next;
    }
}

/// Run a short-lived command to completion, sending its output to `sink`.
pub async fn run<S: AsRef<OsStr>>(program: &Path, args: &[S], sink: &LogSink) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| Error::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    sink.write_output(&output.stdout);
    sink.write_output(&output.stderr);

    if !output.status.success() {
        return Err(Error::Exit {
            program: program.to_path_buf(),
            status: output.status,
        });
    }
    debug!("{} finished with {}", program.display(), output.status);
    Ok(())
}

async fn forward_output(
    name: String,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    sink: LogSink,
) {
    let mut out = stdout.map(BufReader::new);
    let mut err = stderr.map(BufReader::new);
    let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());

    while out.is_some() || err.is_some() {
        let (stream, read) = tokio::select! {
            read = read_line(&mut out, &mut out_buf), if out.is_some() => (Stream::Stdout, read),
            read = read_line(&mut err, &mut err_buf), if err.is_some() => (Stream::Stderr, read),
        };
        let buf = match stream {
            Stream::Stdout => &mut out_buf,
            Stream::Stderr => &mut err_buf,
        };
        match read {
            Ok(0) => debug!("[{name}] {stream} closed"),
            Ok(_) => {
                sink.write_line(&lossy_line(buf));
                buf.clear();
                continue;
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("[{name}] error reading {stream}: {e}");
                buf.clear();
                continue;
            }
            Err(e) => warn!("[{name}] error reading {stream}, closing it: {e}"),
        }
        match stream {
            Stream::Stdout => out = None,
            Stream::Stderr => err = None,
        }
    }
    debug!("[{name}] output closed");
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Append the next raw line to `buf`. Partial reads stay in `buf` when the
/// future is dropped, so the same buffer must be passed on the next call.
async fn read_line<R>(reader: &mut Option<BufReader<R>>, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read_until(b'\n', buf).await,
        None => Ok(0),
    }
}

/// Line without its terminator; invalid UTF-8 is replaced rather than rejected.
fn lossy_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
