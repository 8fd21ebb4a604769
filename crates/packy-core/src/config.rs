use crate::error::{PackyError, Result};
use crate::paths;
use crate::schedule::{CronSchedule, DEFAULT_CRON};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reserved pseudo-maintainer owning every package without a human maintainer.
pub const ORPHAN: &str = "orphan";
const ORPHAN_IRC_NAME: &str = "orphaned";

pub const DEFAULT_IRC_HOSTNAME: &str = "http://artix-notifier-irc:8081";
pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_METRIC_PREFIX: &str = "artixpackages_";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Maintainer
// ---------------------------------------------------------------------------

/// A maintainer identity. Config entries may be a bare name or an object;
/// both deserialize into this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MaintainerEntry")]
pub struct Maintainer {
    pub name: String,
    /// Apprise notification URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    /// Nick to address on IRC, when different from `name`.
    #[serde(
        default,
        rename = "ircName",
        skip_serializing_if = "Option::is_none"
    )]
    pub irc_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaintainerEntry {
    Bare(String),
    Full {
        name: String,
        #[serde(default)]
        channels: Vec<String>,
        #[serde(default, rename = "ircName")]
        irc_name: Option<String>,
    },
}

impl From<MaintainerEntry> for Maintainer {
    fn from(entry: MaintainerEntry) -> Self {
        match entry {
            MaintainerEntry::Bare(name) => Maintainer::named(name),
            MaintainerEntry::Full {
                name,
                channels,
                irc_name,
            } => Maintainer {
                name,
                channels,
                irc_name,
            },
        }
    }
}

impl Maintainer {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channels: Vec::new(),
            irc_name: None,
        }
    }

    pub fn orphan() -> Self {
        Self {
            name: ORPHAN.to_string(),
            channels: Vec::new(),
            irc_name: Some(ORPHAN_IRC_NAME.to_string()),
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.name == ORPHAN
    }

    pub fn irc_name(&self) -> &str {
        self.irc_name.as_deref().unwrap_or(&self.name)
    }
}

// ---------------------------------------------------------------------------
// IRC
// ---------------------------------------------------------------------------

/// Connection settings for the IRC relay. Their presence enables IRC
/// notifications; the relay itself owns the connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrcFrameworkConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub nick: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrcClientConfig {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_key: Option<String>,
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

/// External programs the cycle shells out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Ownership query tool, invoked as `<query> <query_args..> -m <name>`.
    #[serde(default = "default_query_tool")]
    pub query: String,
    #[serde(default = "default_query_args")]
    pub query_args: Vec<String>,
    /// Update probe tool.
    #[serde(default = "default_probe_tool")]
    pub probe: String,
    #[serde(default = "default_move_args")]
    pub move_args: Vec<String>,
    #[serde(default = "default_update_args")]
    pub update_args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between ownership queries.
    #[serde(default = "default_query_delay_ms")]
    pub query_delay_ms: u64,
    /// Lock cache removed when the probe times out.
    /// Defaults to `$HOME/.cache/artix-checkupdates`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,
}

fn default_query_tool() -> String {
    "artixpkg".to_string()
}

fn default_query_args() -> Vec<String> {
    vec!["admin".to_string(), "query".to_string()]
}

fn default_probe_tool() -> String {
    "artix-checkupdates".to_string()
}

fn default_move_args() -> Vec<String> {
    vec!["-m".to_string()]
}

fn default_update_args() -> Vec<String> {
    vec!["-u".to_string()]
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_query_delay_ms() -> u64 {
    50
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            query: default_query_tool(),
            query_args: default_query_args(),
            probe: default_probe_tool(),
            move_args: default_move_args(),
            update_args: default_update_args(),
            timeout_secs: default_timeout_secs(),
            query_delay_ms: default_query_delay_ms(),
            lock_dir: None,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn query_delay(&self) -> Duration {
        Duration::from_millis(self.query_delay_ms)
    }

    pub fn lock_dir(&self) -> Result<PathBuf> {
        match &self.lock_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_lock_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    /// Base URL of the Apprise API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apprise: Option<String>,
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Days between ownership reconciliations.
    #[serde(default = "default_syncfreq")]
    pub syncfreq: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, rename = "savePath", skip_serializing_if = "Option::is_none")]
    pub save_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irchostname: Option<String>,
    #[serde(
        default,
        rename = "irc-framework",
        skip_serializing_if = "Option::is_none"
    )]
    pub irc_framework: Option<IrcFrameworkConfig>,
    #[serde(default, rename = "ircClient", skip_serializing_if = "Option::is_none")]
    pub irc_client: Option<IrcClientConfig>,
    /// Prefix of the Prometheus gauge names.
    #[serde(default, rename = "metricPrefix", skip_serializing_if = "Option::is_none")]
    pub metric_prefix: Option<String>,
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_cron() -> String {
    DEFAULT_CRON.to_string()
}

fn default_syncfreq() -> u32 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maintainers: Vec::new(),
            apprise: None,
            cron: default_cron(),
            syncfreq: default_syncfreq(),
            db: None,
            port: None,
            save_path: None,
            irchostname: None,
            irc_framework: None,
            irc_client: None,
            metric_prefix: None,
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load a YAML (or JSON) config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PackyError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Configured maintainers followed by the orphan scope, which is always
    /// queried and notified last.
    pub fn maintainers_with_orphan(&self) -> Vec<Maintainer> {
        let mut all: Vec<Maintainer> = self
            .maintainers
            .iter()
            .filter(|m| !m.is_orphan())
            .cloned()
            .collect();
        all.push(Maintainer::orphan());
        all
    }

    /// Sorted configured maintainer names, for display.
    pub fn maintainer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.maintainers.iter().map(|m| m.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn sync_interval(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.syncfreq))
    }

    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| PathBuf::from(paths::DEFAULT_DB_FILE))
    }

    pub fn save_path(&self) -> PathBuf {
        self.save_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(paths::DEFAULT_SAVE_FILE))
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// IRC relay base URL, or `None` when IRC notifications are disabled.
    pub fn irc_gateway(&self) -> Option<String> {
        self.irc_framework.as_ref()?;
        Some(
            self.irchostname
                .clone()
                .unwrap_or_else(|| DEFAULT_IRC_HOSTNAME.to_string()),
        )
    }

    pub fn schedule(&self) -> Result<CronSchedule> {
        CronSchedule::parse(&self.cron)
    }

    pub fn metric_prefix(&self) -> &str {
        self.metric_prefix.as_deref().unwrap_or(DEFAULT_METRIC_PREFIX)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.maintainers.is_empty() {
            warn(
                WarnLevel::Warning,
                "no maintainers configured; only orphaned packages will be tracked".into(),
            );
        }

        let mut seen = HashSet::new();
        for m in &self.maintainers {
            if m.name.trim().is_empty() {
                warn(WarnLevel::Error, "maintainer with an empty name".into());
                continue;
            }
            if !seen.insert(m.name.as_str()) {
                warn(
                    WarnLevel::Warning,
                    format!("maintainer '{}' is listed more than once", m.name),
                );
            }
            if m.is_orphan() {
                warn(
                    WarnLevel::Warning,
                    format!("'{ORPHAN}' is reserved for unowned packages and is always queried"),
                );
            }
            if !m.channels.is_empty() && self.apprise.is_none() {
                warn(
                    WarnLevel::Warning,
                    format!(
                        "maintainer '{}' declares channels but no 'apprise' URL is set",
                        m.name
                    ),
                );
            }
        }

        if let Err(e) = self.schedule() {
            warn(WarnLevel::Error, e.to_string());
        }

        if !is_metric_prefix(self.metric_prefix()) {
            warn(
                WarnLevel::Error,
                format!(
                    "metricPrefix '{}' may only contain letters, digits, '_' and ':' and must not start with a digit",
                    self.metric_prefix()
                ),
            );
        }

        if self.syncfreq == 0 {
            warn(
                WarnLevel::Warning,
                "syncfreq=0 reconciles ownership on every cycle".into(),
            );
        }

        if self.tools.timeout_secs == 0 {
            warn(
                WarnLevel::Error,
                "tools.timeout_secs must be greater than zero".into(),
            );
        }

        for tool in [&self.tools.query, &self.tools.probe] {
            if which::which(tool).is_err() {
                warn(
                    WarnLevel::Warning,
                    format!("'{tool}' was not found on PATH"),
                );
            }
        }

        warnings
    }
}

impl Config {
    /// Fail with [`PackyError::InvalidConfig`] when [`Config::validate`]
    /// reports any error-level finding.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PackyError::InvalidConfig(errors.join("; ")))
        }
    }
}

/// Prometheus metric names match `[a-zA-Z_:][a-zA-Z0-9_:]*`; an empty
/// prefix is allowed.
fn is_metric_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        Some(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
