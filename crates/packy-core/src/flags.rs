//! Per-package notification lifecycle.
//!
//! Each package carries one [`Flag`] per [`ActionType`]. A cycle moves flags
//! through three steps:
//!
//! ```text
//!   observe   candidates from the probe:  Idle → New,  anything else → Repeat
//!   notify    every record at New is reported once to its maintainer
//!   decay     Grace → Idle, then Repeat | New → Grace
//! ```
//!
//! A package that is notified therefore sits at `Grace` for one full cycle
//! after notification. If it is observed again while at `Grace` it becomes
//! `Repeat`, which never notifies; only a package that has decayed all the
//! way back to `Idle` can notify again.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Maintainer;
use crate::error::Result;
use crate::notify::NotifySet;
use crate::store::PackageStore;
use crate::types::ActionType;

// ---------------------------------------------------------------------------
// Flag
// ---------------------------------------------------------------------------

/// Lifecycle state of one action type on one package.
///
/// Stored in SQLite as the raw integers `0, 1, 2, 4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// Not actionable.
    Idle,
    /// Notified earlier; resets to `Idle` on the next decay.
    Grace,
    /// Actionable again after having been notified.
    Repeat,
    /// Newly actionable and not yet notified.
    New,
}

impl Flag {
    /// Map a stored integer onto a state.
    ///
    /// Values outside `{0, 1, 2, 4}` can only come from `increment_flag`;
    /// they are flagged but must never notify, which is what `Repeat` means.
    pub fn from_raw(raw: i64) -> Flag {
        match raw {
            i64::MIN..=0 => Flag::Idle,
            1 => Flag::Grace,
            4 => Flag::New,
            _ => Flag::Repeat,
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            Flag::Idle => 0,
            Flag::Grace => 1,
            Flag::Repeat => 2,
            Flag::New => 4,
        }
    }

    /// State after the probe reports the package as actionable.
    pub fn observed(self) -> Flag {
        match self {
            Flag::Idle => Flag::New,
            Flag::Grace | Flag::Repeat | Flag::New => Flag::Repeat,
        }
    }

    /// State after the end-of-cycle decay.
    pub fn decayed(self) -> Flag {
        match self {
            Flag::Idle | Flag::Grace => Flag::Idle,
            Flag::Repeat | Flag::New => Flag::Grace,
        }
    }

    /// State after startup recovery of an interrupted cycle.
    pub fn recovered(self) -> Flag {
        match self {
            Flag::Repeat | Flag::New => Flag::Grace,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Idle => "idle",
            Flag::Grace => "grace",
            Flag::Repeat => "repeat",
            Flag::New => "new",
        }
    }
}

// ---------------------------------------------------------------------------
// FlagFilter
// ---------------------------------------------------------------------------

/// Predicate over the raw stored flag value, evaluated in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagFilter {
    Equals(Flag),
    /// Raw value strictly greater than the given state.
    Above(Flag),
    /// Any nonzero value.
    Flagged,
    /// Exactly `New`: the notification set.
    New,
}

impl FlagFilter {
    /// SQL comparison operator and operand for this predicate.
    pub(crate) fn sql(self) -> (&'static str, i64) {
        match self {
            FlagFilter::Equals(f) => ("=", f.as_raw()),
            FlagFilter::Above(f) => (">", f.as_raw()),
            FlagFilter::Flagged => (">", Flag::Idle.as_raw()),
            FlagFilter::New => ("=", Flag::New.as_raw()),
        }
    }
}

// ---------------------------------------------------------------------------
// FlagEngine
// ---------------------------------------------------------------------------

/// Applies the flag lifecycle to the package store.
pub struct FlagEngine {
    store: Arc<PackageStore>,
}

impl FlagEngine {
    pub fn new(store: Arc<PackageStore>) -> Self {
        Self { store }
    }

    /// Mark every known candidate as observed. Unknown names are ignored
    /// until ownership reconciliation has seen them, and a name reported
    /// more than once is observed once.
    ///
    /// Returns the number of distinct candidates that were known to the store.
    pub fn observe(&self, action: ActionType, candidates: &[String]) -> Result<usize> {
        let mut known = 0;
        let mut seen = HashSet::new();
        for name in candidates {
            if !seen.insert(name.as_str()) {
                continue;
            }
            let Some(record) = self.store.get(name)? else {
                debug!(package = %name, %action, "candidate not in store, ignoring");
                continue;
            };
            let next = record.flag(action).observed();
            self.store.set_flag(name, action, next)?;
            known += 1;
        }
        Ok(known)
    }

    /// Newly actionable packages grouped by maintainer. Maintainers with
    /// nothing new are omitted.
    pub fn notify_sets(
        &self,
        action: ActionType,
        maintainers: &[Maintainer],
    ) -> Result<Vec<NotifySet>> {
        let mut sets = Vec::new();
        for maintainer in maintainers {
            let packages: Vec<String> = self
                .store
                .list_by_maintainer(&maintainer.name, action, FlagFilter::New)?
                .into_iter()
                .map(|r| r.package)
                .collect();
            if packages.is_empty() {
                continue;
            }
            sets.push(NotifySet {
                maintainer: maintainer.clone(),
                action,
                packages,
            });
        }
        Ok(sets)
    }

    /// End-of-cycle decay. The order matters: resetting `Grace` first keeps
    /// packages that were just notified from being zeroed in the same pass.
    pub fn decay(&self, action: ActionType) -> Result<()> {
        let reset = self.store.reset_flags_in_state(
            action,
            FlagFilter::Equals(Flag::Grace),
            Flag::Grace.decayed(),
        )?;
        let demoted =
            self.store
                .reset_flags_in_state(action, FlagFilter::Above(Flag::Grace), Flag::Grace)?;
        debug!(%action, reset, demoted, "decayed flags");
        Ok(())
    }

    /// Normalize flags left mid-transition by an interrupted cycle.
    pub fn restore_all(&self) -> Result<usize> {
        let mut restored = 0;
        for &action in ActionType::all() {
            restored += self.store.reset_flags_in_state(
                action,
                FlagFilter::Above(Flag::Grace),
                Flag::New.recovered(),
            )?;
        }
        Ok(restored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
