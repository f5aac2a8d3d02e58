use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::journal::remote::{DEFAULT_PORT, ReconnectPolicy};

/// Live tail of the local journal and of remote hosts running
/// systemd-journal-gatewayd.
#[derive(Debug, Parser)]
#[command(name = "journal-aggregator", version)]
pub struct Cli {
    /// Path where the current read position for each source is stored
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub cursor_path: PathBuf,

    /// Read from the local systemd journal
    #[arg(short, long)]
    pub local: bool,

    /// Port of systemd-journal-gatewayd on the remote hosts
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds an error line stays eligible to be held at the top
    #[arg(long, value_name = "SECS", default_value_t = 8)]
    pub error_window: u64,

    /// Retry hosts that could not be reached at all after this many seconds
    /// instead of giving up on them
    #[arg(long, value_name = "SECS")]
    pub retry_unreachable: Option<u64>,

    /// Diagnostics level: off, error, warn, info, debug or trace
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    /// Also append diagnostics to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Do not send diagnostics to the systemd journal
    #[arg(long)]
    pub no_journal_log: bool,

    /// Hostnames or IPs of machines running systemd-journal-gatewayd
    #[arg(value_name = "REMOTE_HOSTS")]
    pub remote_hosts: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one remote host or the local journal must be specified.")]
    NoSources,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cursor_path: PathBuf,
    pub local: bool,
    pub remote_hosts: Vec<String>,
    pub port: u16,
    pub error_window: Duration,
    pub reconnect: ReconnectPolicy,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
    pub journal_log: bool,
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, ConfigError> {
        if !cli.local && cli.remote_hosts.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let reconnect = match cli.retry_unreachable {
            Some(secs) => ReconnectPolicy::RetryAfter(Duration::from_secs(secs)),
            None => ReconnectPolicy::Stop,
        };

        Ok(Self {
            cursor_path: cli.cursor_path,
            local: cli.local,
            remote_hosts: cli.remote_hosts,
            port: cli.port,
            error_window: Duration::from_secs(cli.error_window),
            reconnect,
            log_level: cli.log_level,
            log_file: cli.log_file,
            journal_log: !cli.no_journal_log,
        })
    }
}
