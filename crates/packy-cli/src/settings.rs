use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use packy_core::Config;

/// Per-key overrides layered over the config file. Each one can also come
/// from the environment.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// SQLite package store
    #[arg(long, global = true, env = "DBPATH")]
    pub db: Option<PathBuf>,

    /// Cycle save-state JSON file
    #[arg(long = "save-path", global = true, env = "SAVEPATH")]
    pub save_path: Option<PathBuf>,

    /// Cron expression driving the cycle
    #[arg(long, global = true, env = "CRON")]
    pub cron: Option<String>,

    /// Days between ownership reconciliations
    #[arg(long, global = true, env = "SYNCFREQ")]
    pub syncfreq: Option<u32>,

    /// Port of the query server
    #[arg(long, global = true, env = "PORT")]
    pub port: Option<u16>,

    /// Base URL of the IRC relay
    #[arg(long = "irc-hostname", global = true, env = "IRCHOSTNAME")]
    pub irc_hostname: Option<String>,

    /// Prefix of the Prometheus gauge names
    #[arg(long = "metric-prefix", global = true, env = "METRICPREFIX")]
    pub metric_prefix: Option<String>,
}

impl Overrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(db) = self.db {
            config.db = Some(db);
        }
        if let Some(path) = self.save_path {
            config.save_path = Some(path);
        }
        if let Some(cron) = self.cron {
            config.cron = cron;
        }
        if let Some(days) = self.syncfreq {
            config.syncfreq = days;
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if let Some(host) = self.irc_hostname {
            config.irchostname = Some(host);
        }
        if let Some(prefix) = self.metric_prefix {
            config.metric_prefix = Some(prefix);
        }
    }
}

/// Load the config file at `path` and apply `overrides`.
pub fn load(path: &Path, overrides: Overrides) -> anyhow::Result<Config> {
    let mut config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    overrides.apply(&mut config);
    Ok(config)
}
