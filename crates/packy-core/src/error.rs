use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackyError {
    #[error("config not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("package not found: {0}")]
    PackageNotFound(String),

    #[error("failed to spawn '{program}': {reason}")]
    ToolSpawnFailed { program: String, reason: String },

    #[error("'{program}' timed out after {secs}s")]
    ToolTimedOut { program: String, secs: u64 },

    #[error("'{program}' exited with {status}")]
    ToolFailed { program: String, status: String },

    #[error("'{program}' wrote to stderr: {stderr}")]
    ToolStderr { program: String, stderr: String },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PackyError>;
