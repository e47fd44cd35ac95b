// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::backoff::Backoff;
use crate::errors::{Error, Result};
use crate::sink::LogSink;
use anyhow::Context;
use serde::Deserialize;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "GHOST_POSTGRES_CONFIG";

const INITDB_GLOBS: &[&str] = &[
    "/usr/local/pgsql/bin/initdb",
    "/usr/local/initdb",
    "/usr/lib/postgresql/*/bin/initdb",      // Debian/Ubuntu
    "/opt/local/lib/postgresql*/bin/initdb", // MacPorts
    "/usr/local/bin/initdb",                 // Homebrew
    "/usr/bin/initdb",                       // Alpine
];

const POSTGRES_GLOBS: &[&str] = &[
    "/usr/local/pgsql/bin/postgres",
    "/usr/local/postgres",
    "/usr/lib/postgresql/*/bin/postgres",
    "/opt/local/lib/postgresql*/bin/postgres",
    "/usr/local/bin/postgres",
    "/usr/bin/postgres",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_dbname() -> String {
    "test".to_string()
}

fn default_default_dbname() -> String {
    "postgres".to_string()
}

fn default_initdb_args() -> Vec<String> {
    strings(&["-U", "postgres", "-A", "trust", "--lc-messages=C"])
}

fn default_initdb_globs() -> Vec<String> {
    strings(INITDB_GLOBS)
}

fn default_postgres_globs() -> Vec<String> {
    strings(POSTGRES_GLOBS)
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_prefix() -> String {
    "testing-postgresql-".to_string()
}

fn default_conn_options() -> Vec<String> {
    strings(&["sslmode=disable"])
}

fn default_stop_grace_ms() -> u64 {
    1000
}

/// Everything a `GhostPostgres` needs to provision one server.
///
/// `Config::default()` is the canonical builder; override fields directly or
/// load a YAML file with [`load_config`]. A `port` of 0 is resolved to a free
/// port when the controller is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub dbname: String,
    /// Administrative database used for readiness probes and `CREATE DATABASE`.
    pub default_dbname: String,
    pub initdb_args: Vec<String>,
    pub initdb_globs: Vec<String>,
    pub postgres_globs: Vec<String>,
    pub tmp_dir: PathBuf,
    pub prefix: String,
    pub conn_options: Vec<String>,
    pub readiness: Backoff,
    pub stop_grace_ms: u64,
    #[serde(skip)]
    pub log_sink: LogSink,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            user: default_user(),
            dbname: default_dbname(),
            default_dbname: default_default_dbname(),
            initdb_args: default_initdb_args(),
            initdb_globs: default_initdb_globs(),
            postgres_globs: default_postgres_globs(),
            tmp_dir: default_tmp_dir(),
            prefix: default_prefix(),
            conn_options: default_conn_options(),
            readiness: Backoff::default(),
            stop_grace_ms: default_stop_grace_ms(),
            log_sink: LogSink::default(),
        }
    }
}

impl Config {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// `user=<u> host=<h> port=<p> dbname=<d> <options...>`
    pub fn conn_string_for(&self, dbname: &str) -> String {
        let mut parts = vec![
            format!("user={}", self.user),
            format!("host={}", self.host),
            format!("port={}", self.port),
            format!("dbname={dbname}"),
        ];
        parts.extend(self.conn_options.iter().cloned());
        parts.join(" ")
    }

    /// `postgres://<u>@<h>:<p>/<d>?<opt1>&<opt2>`
    pub fn url_for(&self, dbname: &str) -> String {
        let base = format!(
            "postgres://{}@{}:{}/{dbname}",
            self.user, self.host, self.port
        );
        if self.conn_options.is_empty() {
            base
        } else {
            format!("{base}?{}", self.conn_options.join("&"))
        }
    }
}

/// Ask the kernel for an unused TCP port on the loopback interface.
///
/// The listener is dropped before returning, so the port is only known to be
/// free at the moment of the call.
pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(Error::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(Error::PortAllocation)?
        .port();
    Ok(port)
}

/// Path of an optional YAML config file, taken from `GHOST_POSTGRES_CONFIG`.
pub fn config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from)
}

/// Parse a YAML file into a `Config`. Missing keys keep their defaults.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixed_config() -> Config {
        Config {
            user: "postgres".into(),
            host: "localhost".into(),
            port: 12345,
            dbname: "test".into(),
            conn_options: vec!["sslmode=disable".into()],
            ..Config::default()
        }
    }

    #[test]
    fn test_conn_string() {
        let cfg = fixed_config();
        assert_eq!(
            cfg.conn_string_for(&cfg.dbname),
            "user=postgres host=localhost port=12345 dbname=test sslmode=disable"
        );
    }

    #[test]
    fn test_url() {
        let cfg = fixed_config();
        assert_eq!(
            cfg.url_for(&cfg.dbname),
            "postgres://postgres@localhost:12345/test?sslmode=disable"
        );
    }

    #[test]
    fn test_options_join_characters_differ() {
        let mut cfg = fixed_config();
        cfg.conn_options = vec!["sslmode=disable".into(), "connect_timeout=5".into()];

        let conn = cfg.conn_string_for("x");
        let url = cfg.url_for("x");
        assert!(conn.ends_with("dbname=x sslmode=disable connect_timeout=5"));
        assert!(url.ends_with("@localhost:12345/x?sslmode=disable&connect_timeout=5"));
    }

    #[test]
    fn test_no_options() {
        let mut cfg = fixed_config();
        cfg.conn_options.clear();
        assert_eq!(
            cfg.conn_string_for("x"),
            "user=postgres host=localhost port=12345 dbname=x"
        );
        assert_eq!(cfg.url_for("x"), "postgres://postgres@localhost:12345/x");
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.default_dbname, "postgres");
        assert_eq!(cfg.prefix, "testing-postgresql-");
        assert_eq!(cfg.stop_grace(), Duration::from_secs(1));
        assert!(cfg.initdb_globs.iter().all(|g| g.ends_with("initdb")));
        assert!(cfg.postgres_globs.iter().all(|g| g.ends_with("postgres")));
        assert!(matches!(cfg.log_sink, LogSink::Discard));
    }

    #[test]
    fn test_free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghost.yaml");
        let yaml = r#"
port: 15432
dbname: widgets
conn_options:
  - sslmode=disable
  - application_name=tests
readiness:
  max_delay_ms: 2000
"#;
        fs::write(&path, yaml).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.port, 15432);
        assert_eq!(cfg.dbname, "widgets");
        assert_eq!(cfg.conn_options.len(), 2);
        assert_eq!(cfg.readiness.max_delay(), Duration::from_secs(2));
        assert_eq!(cfg.readiness.min_delay(), Duration::from_millis(100));
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.initdb_globs, default_initdb_globs());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "port: [not a port").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("/nonexistent/ghost.yaml")).is_err());
    }
}
