//! Single-flight polling cycle.
//!
//! ```text
//!   trigger ──► guard held? ──yes──► Skipped
//!                   │no
//!                   ▼
//!   reconcile (if due) ─► persist ─► per action: probe ─► observe ─► notify ─► decay
//!                                                          ─► persist ─► release guard
//! ```
//!
//! Each cron trigger spawns its own task, so a cycle that overruns its slot
//! turns the next trigger into a no-op instead of queueing it.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::{Config, Maintainer};
use crate::error::Result;
use crate::flags::FlagEngine;
use crate::notify::NotifySink;
use crate::probe::UpdateProber;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::savestate::SaveState;
use crate::schedule::CronSchedule;
use crate::store::PackageStore;
use crate::types::ActionType;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub action: ActionType,
    /// Names reported by the probe.
    pub candidates: usize,
    /// Candidates present in the store.
    pub known: usize,
    /// Packages handed to the notification sink.
    pub notified: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionReport {
    fn failed(action: ActionType, error: String) -> Self {
        Self {
            action,
            candidates: 0,
            known: 0,
            notified: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile: Option<ReconcileReport>,
    pub actions: Vec<ActionReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle held the guard.
    Skipped,
    Completed(CycleReport),
}

// ---------------------------------------------------------------------------
// CycleGuard
// ---------------------------------------------------------------------------

/// Holds the single-flight flag; clears it on drop, including during unwinding.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// CycleScheduler
// ---------------------------------------------------------------------------

pub struct CycleScheduler {
    store: Arc<PackageStore>,
    engine: FlagEngine,
    reconciler: Reconciler,
    prober: UpdateProber,
    sink: Arc<dyn NotifySink>,
    maintainers: Vec<Maintainer>,
    sync_interval: chrono::Duration,
    save_path: PathBuf,
    state: Arc<RwLock<SaveState>>,
    running: AtomicBool,
}

impl CycleScheduler {
    pub fn new(config: &Config, store: Arc<PackageStore>, sink: Arc<dyn NotifySink>) -> Self {
        Self {
            engine: FlagEngine::new(store.clone()),
            reconciler: Reconciler::new(store.clone(), &config.tools),
            prober: UpdateProber::from_config(&config.tools),
            store,
            sink,
            maintainers: config.maintainers_with_orphan(),
            sync_interval: config.sync_interval(),
            save_path: config.save_path(),
            state: Arc::new(RwLock::new(SaveState::default())),
            running: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> Arc<PackageStore> {
        self.store.clone()
    }

    /// Save-state shared with readers. Only the scheduler writes to it.
    pub fn state(&self) -> Arc<RwLock<SaveState>> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Load persisted save-state and normalize flags an interrupted cycle
    /// left behind. Returns the number of flags restored.
    pub async fn startup(&self) -> Result<usize> {
        let loaded = SaveState::load(&self.save_path);
        *self.state.write().await = loaded;
        let restored = self.engine.restore_all()?;
        if restored > 0 {
            info!(restored, "normalized flags from an interrupted cycle");
        }
        Ok(restored)
    }

    fn try_acquire(&self) -> Option<CycleGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard(&self.running))
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        self.run_cycle_with(false).await
    }

    /// Run one cycle; `force_sync` reconciles ownership regardless of `last-sync`.
    pub async fn run_cycle_with(&self, force_sync: bool) -> CycleOutcome {
        let Some(_guard) = self.try_acquire() else {
            info!("previous cycle still running, skipping trigger");
            return CycleOutcome::Skipped;
        };

        info!("starting scheduled cycle");
        let started_at = Utc::now();
        let due = force_sync
            || self
                .state
                .read()
                .await
                .reconciliation_due(started_at, self.sync_interval);

        let mut reconcile = None;
        if due {
            match self.reconciler.reconcile(&self.maintainers).await {
                Ok(report) => {
                    self.state.write().await.last_sync = Some(started_at);
                    reconcile = Some(report);
                }
                Err(e) => error!(error = %e, "ownership reconciliation aborted"),
            }
            self.persist().await;
        }

        let mut actions = Vec::with_capacity(ActionType::all().len());
        for &action in ActionType::all() {
            actions.push(self.run_action(action).await);
        }
        self.persist().await;

        info!("cycle complete");
        CycleOutcome::Completed(CycleReport {
            started_at,
            reconcile,
            actions,
        })
    }

    async fn run_action(&self, action: ActionType) -> ActionReport {
        let candidates = match self.prober.probe(action).await {
            Ok(c) => c,
            Err(e) => {
                warn!(%action, error = %e, "probe failed, keeping previous snapshot");
                return ActionReport::failed(action, e.to_string());
            }
        };
        self.state
            .write()
            .await
            .set_candidates(action, candidates.clone());

        match self.apply_flags(action, &candidates) {
            Ok(report) => report,
            Err(e) => {
                error!(%action, error = %e, "flag update failed");
                ActionReport::failed(action, e.to_string())
            }
        }
    }

    fn apply_flags(&self, action: ActionType, candidates: &[String]) -> Result<ActionReport> {
        let known = self.engine.observe(action, candidates)?;
        let sets = self.engine.notify_sets(action, &self.maintainers)?;
        let notified = sets.iter().map(|s| s.packages.len()).sum();
        for set in sets {
            info!(
                maintainer = %set.maintainer.name,
                %action,
                count = set.packages.len(),
                "packages newly actionable"
            );
            self.sink.dispatch(set);
        }
        self.engine.decay(action)?;
        Ok(ActionReport {
            action,
            candidates: candidates.len(),
            known,
            notified,
            error: None,
        })
    }

    async fn persist(&self) {
        let snapshot = self.state.read().await.clone();
        if let Err(e) = snapshot.save(&self.save_path) {
            error!(path = %self.save_path.display(), error = %e, "failed to write save data");
        }
    }

    /// Fire a cycle on every trigger of `schedule` until `shutdown` resolves.
    /// A cycle still running at shutdown is not awaited.
    pub async fn run_forever<F>(self: Arc<Self>, schedule: CronSchedule, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(cron = schedule.expr(), "scheduler started");
        let mut fired = None;
        loop {
            let now = Utc::now();
            let Some(next) = schedule.next_trigger(fired, now) else {
                warn!(cron = schedule.expr(), "schedule has no further triggers");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = &mut shutdown => {
                    info!("scheduler stopping");
                    return;
                }
                _ = tokio::time::sleep(wait) => {
                    fired = Some(next);
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.run_cycle().await;
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
