use crate::error::{PackyError, Result};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Defaults (relative to the working directory)
// ---------------------------------------------------------------------------

pub const DEFAULT_CONFIG_FILE: &str = "config/config.yaml";
pub const DEFAULT_DB_FILE: &str = "config/packages.db";
pub const DEFAULT_SAVE_FILE: &str = "config/data.json";

/// Cache directory where `artix-checkupdates` keeps its pacman lock.
pub const CHECKUPDATES_CACHE_DIR: &str = ".cache/artix-checkupdates";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn default_lock_dir() -> Result<PathBuf> {
    let home = home::home_dir().ok_or(PackyError::HomeNotFound)?;
    Ok(home.join(CHECKUPDATES_CACHE_DIR))
}
