//! Daemon configuration
//!
//! Defaults overridden by `TALLY_*` environment variables
//! (`TALLY_DB_PATH`, `TALLY_RPC_PORT`, ...).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.tally/jobs.db";
const DEFAULT_OUTBOX_DIR: &str = "~/.tally/outbox";
const DEFAULT_DOCUMENT_DIR: &str = "~/.tally/documents";
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9640;
const DEFAULT_LEASE_MS: i64 = 5 * 60 * 1000;
const DEFAULT_REAPER_INTERVAL_SECS: u64 = 30;
const DEFAULT_WORKERS_PER_QUEUE: usize = 1;
const DEFAULT_MAIL_FROM: &str = "billing@tally.local";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// SQLite file path or `sqlite:` URL
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub lease_ms: i64,
    pub reaper_interval_secs: u64,
    pub workers_per_queue: usize,
    pub log_format: LogFormat,
    /// Rolling log files go here instead of stdout when set
    #[serde(default)]
    pub log_dir: Option<String>,
    pub mail_from: String,
    pub outbox_dir: String,
    pub document_dir: String,
    #[serde(default)]
    pub document_base_url: Option<String>,
}

impl DaemonConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(None)
    }

    /// Load with an explicit variable map in place of the process environment
    pub fn from_env(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("rpc_host", DEFAULT_RPC_HOST)?
            .set_default("rpc_port", i64::from(DEFAULT_RPC_PORT))?
            .set_default("lease_ms", DEFAULT_LEASE_MS)?
            .set_default("reaper_interval_secs", DEFAULT_REAPER_INTERVAL_SECS)?
            .set_default("workers_per_queue", DEFAULT_WORKERS_PER_QUEUE as u64)?
            .set_default("log_format", "pretty")?
            .set_default("mail_from", DEFAULT_MAIL_FROM)?
            .set_default("outbox_dir", DEFAULT_OUTBOX_DIR)?
            .set_default("document_dir", DEFAULT_DOCUMENT_DIR)?
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()
            .context("Failed to read configuration")?;

        let mut cfg: DaemonConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.expand_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    fn expand_paths(&mut self) {
        for path in [
            &mut self.db_path,
            &mut self.outbox_dir,
            &mut self.document_dir,
        ] {
            *path = shellexpand::tilde(path.as_str()).into_owned();
        }
        if let Some(dir) = self.log_dir.as_mut() {
            *dir = shellexpand::tilde(dir.as_str()).into_owned();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.lease_ms <= 0 {
            bail!("lease_ms must be positive (got {})", self.lease_ms);
        }
        if self.workers_per_queue == 0 {
            bail!("workers_per_queue must be at least 1");
        }
        if self.reaper_interval_secs == 0 {
            bail!("reaper_interval_secs must be at least 1");
        }
        Ok(())
    }

    /// Connection URL for sqlx
    pub fn database_url(&self) -> String {
        if self.db_path.starts_with("sqlite:") {
            self.db_path.clone()
        } else {
            format!("sqlite://{}", self.db_path)
        }
    }

    /// Parent directory of a file-backed database, if any
    pub fn db_dir(&self) -> Option<PathBuf> {
        if self.db_path.starts_with("sqlite:") {
            return None;
        }
        PathBuf::from(&self.db_path).parent().map(PathBuf::from)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let cfg = DaemonConfig::from_env(vars(&[])).unwrap();
        assert_eq!(cfg.rpc_host, "127.0.0.1");
        assert_eq!(cfg.rpc_port, 9640);
        assert_eq!(cfg.lease_ms, 300_000);
        assert_eq!(cfg.workers_per_queue, 1);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(!cfg.db_path.starts_with('~'));
        assert!(cfg.db_path.ends_with(".tally/jobs.db"));
    }

    #[test]
    fn test_env_overrides() {
        let cfg = DaemonConfig::from_env(vars(&[
            ("TALLY_RPC_PORT", "9700"),
            ("TALLY_LOG_FORMAT", "json"),
            ("TALLY_WORKERS_PER_QUEUE", "4"),
            ("TALLY_DB_PATH", "sqlite::memory:"),
            ("TALLY_DOCUMENT_BASE_URL", "https://files.tally.test"),
        ]))
        .unwrap();

        assert_eq!(cfg.rpc_port, 9700);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.workers_per_queue, 4);
        assert_eq!(cfg.database_url(), "sqlite::memory:");
        assert_eq!(cfg.db_dir(), None);
        assert_eq!(
            cfg.document_base_url.as_deref(),
            Some("https://files.tally.test")
        );
    }

    #[test]
    fn test_file_path_becomes_url() {
        let cfg = DaemonConfig::from_env(vars(&[("TALLY_DB_PATH", "/var/lib/tally/jobs.db")]))
            .unwrap();
        assert_eq!(cfg.database_url(), "sqlite:///var/lib/tally/jobs.db");
        assert_eq!(cfg.db_dir(), Some(PathBuf::from("/var/lib/tally")));
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert!(DaemonConfig::from_env(vars(&[("TALLY_WORKERS_PER_QUEUE", "0")])).is_err());
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(DaemonConfig::from_env(vars(&[("TALLY_LOG_FORMAT", "xml")])).is_err());
    }
}
