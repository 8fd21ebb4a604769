//! Ownership reconciliation.
//!
//! One pass queries the ownership tool for every maintainer (orphan scope
//! last), stamps every returned package with the pass start time, then purges
//! whatever was not stamped. A maintainer whose query fails contributes
//! nothing to the pass, so packages only that maintainer owned are purged;
//! they come back on the next successful pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Maintainer, ToolsConfig};
use crate::error::{PackyError, Result};
use crate::process::run_command;
use crate::store::PackageStore;

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    /// Maintainers whose query succeeded, with the number of packages returned.
    pub synced: Vec<(String, usize)>,
    pub failed: Vec<String>,
    pub purged: usize,
}

pub struct Reconciler {
    store: Arc<PackageStore>,
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
    delay: Duration,
}

impl Reconciler {
    pub fn new(store: Arc<PackageStore>, tools: &ToolsConfig) -> Self {
        Self {
            store,
            program: tools.query.clone(),
            base_args: tools.query_args.clone(),
            timeout: tools.timeout(),
            delay: tools.query_delay(),
        }
    }

    fn args_for(&self, maintainer: &Maintainer) -> Vec<String> {
        let scope = if maintainer.is_orphan() { "-t" } else { "-m" };
        let mut args = self.base_args.clone();
        args.push(scope.to_string());
        args.push(maintainer.name.clone());
        args
    }

    /// Packages the ownership tool attributes to `maintainer`.
    pub async fn query(&self, maintainer: &Maintainer) -> Result<Vec<String>> {
        let outcome = run_command(&self.program, &self.args_for(maintainer), self.timeout, None)
            .await?;
        if outcome.timed_out {
            return Err(PackyError::ToolTimedOut {
                program: self.program.clone(),
                secs: self.timeout.as_secs(),
            });
        }
        let stderr = outcome.stderr.trim();
        if !stderr.is_empty() {
            warn!(maintainer = %maintainer.name, stderr, "ownership query wrote to stderr");
        }
        if !outcome.succeeded() {
            return Err(PackyError::ToolFailed {
                program: self.program.clone(),
                status: outcome.status_label(),
            });
        }
        Ok(outcome
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Run one full pass over `maintainers` and purge what it did not see.
    pub async fn reconcile(&self, maintainers: &[Maintainer]) -> Result<ReconcileReport> {
        let started_at = Utc::now();
        let mut synced = Vec::new();
        let mut failed = Vec::new();

        for (i, maintainer) in maintainers.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.query(maintainer).await {
                Ok(packages) => {
                    for package in &packages {
                        self.store
                            .upsert_ownership(package, &maintainer.name, started_at)?;
                    }
                    debug!(maintainer = %maintainer.name, count = packages.len(), "synced ownership");
                    synced.push((maintainer.name.clone(), packages.len()));
                }
                Err(e) => {
                    warn!(maintainer = %maintainer.name, error = %e, "ownership query failed, skipping");
                    failed.push(maintainer.name.clone());
                }
            }
        }

        let purged = self.store.purge_stale_before(started_at)?;
        info!(
            synced = synced.len(),
            failed = failed.len(),
            purged,
            "ownership reconciliation complete"
        );
        Ok(ReconcileReport {
            started_at,
            synced,
            failed,
            purged,
        })
    }
}
