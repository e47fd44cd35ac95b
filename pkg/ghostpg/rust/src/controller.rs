// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::backoff::wait_ready;
use crate::config::{Config, free_port};
use crate::errors::{Error, Result};
use crate::locate::find_executable;
use crate::process::{ServerProcess, run};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::time::{Duration, timeout};
use tokio_postgres::{Client, NoTls};

const DATA_SUBDIR: &str = "data";
const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// An ephemeral PostgreSQL server for a test run.
///
/// Owns one instance directory and at most one running server. Not meant to
/// be driven from several tasks at once.
pub struct GhostPostgres {
    config: Config,
    dir: Option<PathBuf>,
    postgres: Option<ServerProcess>,
}

impl GhostPostgres {
    /// Build a controller, allocating a free port when `config.port` is 0.
    pub fn new(mut config: Config) -> Result<Self> {
        if config.port == 0 {
            config.port = free_port()?;
            debug!("allocated port {}", config.port);
        }
        Ok(Self {
            config,
            dir: None,
            postgres: None,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(Config::default())
    }

    /// Adopt an existing instance directory instead of creating one in `init`.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Instance directory, set by `init` and cleared by `destroy`.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.postgres.as_ref().is_some_and(ServerProcess::is_running)
    }

    /// Run `initdb` against a fresh `<tmp_dir>/<prefix><random>/data`.
    pub async fn init(&mut self) -> Result<()> {
        let initdb = find_executable(&self.config.initdb_globs)?;

        if let Some(old) = &self.dir {
            warn!(
                "replacing instance directory {} without destroying it",
                old.display()
            );
        }
        let dir = tempfile::Builder::new()
            .prefix(&self.config.prefix)
            .tempdir_in(&self.config.tmp_dir)
            .map_err(|source| Error::CreateDirectory {
                root: self.config.tmp_dir.clone(),
                source,
            })?
            .keep();
        self.dir = Some(dir);

        let data_dir = self.data_dir()?;
        let mut args: Vec<OsString> = vec!["-D".into(), data_dir.clone().into()];
        args.extend(self.config.initdb_args.iter().map(OsString::from));

        info!("[initdb] initializing {}", data_dir.display());
        run(&initdb, &args, &self.config.log_sink).await
    }

    /// Launch `postgres` in the foreground and wait until it accepts connections.
    ///
    /// If the server never becomes ready it is stopped again and the last
    /// connection error is returned. A server that exits while the probe is
    /// answered by another listener on the port is reported as
    /// [`Error::ExitedDuringStartup`]. No-op when a server is already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("[postgres] already running on port {}", self.config.port);
            return Ok(());
        }
        let postgres = find_executable(&self.config.postgres_globs)?;
        let data_dir = self.data_dir()?;
        let socket_dir = data_dir.parent().unwrap_or(&data_dir).to_path_buf();

        let args: Vec<OsString> = vec![
            "-p".into(),
            self.config.port.to_string().into(),
            "-D".into(),
            data_dir.into(),
            "-k".into(),
            socket_dir.into(),
            "-h".into(),
            self.config.host.clone().into(),
            "-F".into(),
        ];
        let mut server = ServerProcess::new("postgres", postgres, args);
        server.spawn(self.config.log_sink.clone())?;

        let backoff = self.config.readiness;
        let probe_timeout = backoff.max_delay().max(MIN_PROBE_TIMEOUT);
        let this = &*self;
        let ready = wait_ready(&backoff, move || this.ping(probe_timeout)).await;
        if let Err(source) = ready {
            if let Err(e) = server.stop(self.config.stop_grace()).await {
                warn!("[postgres] failed to stop unready server: {e}");
            }
            return Err(Error::NotReady {
                max_delay: backoff.max_delay(),
                source: Box::new(source),
            });
        }

        if let Some(status) = server.try_exit_status().await? {
            return Err(Error::ExitedDuringStartup {
                program: server.program().to_path_buf(),
                status,
            });
        }

        info!(
            "[postgres] ready on {}:{}",
            self.config.host, self.config.port
        );
        self.postgres = Some(server);
        Ok(())
    }

    /// `CREATE DATABASE` for the configured name, via the administrative database.
    pub async fn create(&self) -> Result<()> {
        let client = self.open_for(&self.config.default_dbname).await?;
        client
            .batch_execute(&format!(
                "CREATE DATABASE {}",
                quote_ident(&self.config.dbname)
            ))
            .await?;
        info!("created database {}", self.config.dbname);
        Ok(())
    }

    /// `init`, `start` and `create`, stopping at the first failure.
    pub async fn prepare(&mut self) -> Result<()> {
        self.init().await?;
        self.start().await?;
        self.create().await
    }

    /// Interrupt the server, killing it after the grace period. No-op when
    /// nothing is running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut server) = self.postgres.take() else {
            return Ok(());
        };
        if !server.is_running() {
            return Ok(());
        }
        server.stop(self.config.stop_grace()).await
    }

    /// Remove the instance directory. Removing an absent directory succeeds.
    pub async fn destroy(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("removed {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => {
                let err = Error::RemoveDirectory {
                    path: dir.clone(),
                    source,
                };
                self.dir = Some(dir);
                Err(err)
            }
        }
    }

    /// `stop` then `destroy`. The directory is removed even if `stop` fails.
    pub async fn terminate(&mut self) -> Result<()> {
        if let Err(e) = self.stop().await {
            warn!("[postgres] stop failed, removing files anyway: {e}");
        }
        self.destroy().await
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(DATA_SUBDIR))
            .ok_or(Error::DirectoryNotInitialized)
    }

    /// Connect to the configured test database.
    pub async fn open(&self) -> Result<Client> {
        self.open_for(&self.config.dbname).await
    }

    pub async fn open_for(&self, dbname: &str) -> Result<Client> {
        Ok(connect(&self.conn_string_for(dbname)).await?)
    }

    pub fn conn_string(&self) -> String {
        self.conn_string_for(&self.config.dbname)
    }

    pub fn conn_string_for(&self, dbname: &str) -> String {
        self.config.conn_string_for(dbname)
    }

    pub fn url(&self) -> String {
        self.url_for(&self.config.dbname)
    }

    pub fn url_for(&self, dbname: &str) -> String {
        self.config.url_for(dbname)
    }

    /// One readiness attempt, bounded by `limit` so a listener that never
    /// answers the startup handshake cannot stall the poller.
    async fn ping(&self, limit: Duration) -> Result<()> {
        let conn_string = self.conn_string_for(&self.config.default_dbname);
        let attempt = async {
            let client = connect(&conn_string).await?;
            client.simple_query("SELECT 1").await?;
            Ok::<_, Error>(())
        };
        timeout(limit, attempt)
            .await
            .map_err(|_| Error::ProbeTimeout(limit))?
    }
}

/// Open a client and drive its connection on a background task.
async fn connect(conn_string: &str) -> Result<Client, tokio_postgres::Error> {
    let (client, connection) = tokio_postgres::connect(conn_string, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("connection closed: {e}");
        }
    });
    Ok(client)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
