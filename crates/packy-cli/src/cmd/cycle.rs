use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use packy_core::{CycleOutcome, CycleScheduler, NotifySet, NotifySink, PackageStore};
use packy_notify::Notifier;

use crate::output::{print_json, print_table};
use crate::settings::{self, Overrides};

/// Holds notify sets until the cycle finishes so a one-shot run can deliver
/// them before the runtime shuts down.
#[derive(Default)]
struct Collected(Mutex<Vec<NotifySet>>);

impl NotifySink for Collected {
    fn dispatch(&self, set: NotifySet) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(set);
    }
}

impl Collected {
    fn take(&self) -> Vec<NotifySet> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

pub fn run(
    path: &Path,
    overrides: Overrides,
    force_sync: bool,
    no_notify: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = settings::load(path, overrides)?;
    config.ensure_valid()?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let db = config.db_path();
        let store = Arc::new(
            PackageStore::open(&db)
                .with_context(|| format!("failed to open package store {}", db.display()))?,
        );
        let collected = Arc::new(Collected::default());
        let scheduler = CycleScheduler::new(&config, store, collected.clone());
        scheduler.startup().await?;

        let report = match scheduler.run_cycle_with(force_sync).await {
            CycleOutcome::Completed(report) => report,
            CycleOutcome::Skipped => anyhow::bail!("a cycle is already running"),
        };
        let sets = collected.take();

        if !no_notify {
            let notifier = Notifier::from_config(&config)?;
            for set in &sets {
                notifier.deliver(set).await;
            }
        }

        if json {
            return print_json(&serde_json::json!({
                "report": report,
                "notified": sets,
            }));
        }

        if let Some(rec) = &report.reconcile {
            println!(
                "Reconciled ownership: {} synced, {} failed, {} purged",
                rec.synced.len(),
                rec.failed.len(),
                rec.purged
            );
        }
        let rows = report
            .actions
            .iter()
            .map(|a| {
                vec![
                    a.action.to_string(),
                    a.candidates.to_string(),
                    a.known.to_string(),
                    a.notified.to_string(),
                    a.error.clone().unwrap_or_default(),
                ]
            })
            .collect();
        print_table(&["ACTION", "CANDIDATES", "KNOWN", "NEW", "ERROR"], rows);
        for set in &sets {
            println!(
                "\n{}\n  {}",
                set.headline(false),
                set.packages.join("\n  ")
            );
        }
        Ok(())
    })
}
