use crate::output::{print_json, print_table};
use crate::settings::{self, Overrides};
use anyhow::Context;
use packy_core::{ActionType, FlagFilter, PackageRecord, PackageStore};
use std::path::Path;

pub fn run(path: &Path, overrides: Overrides, name: &str, json: bool) -> anyhow::Result<()> {
    let config = settings::load(path, overrides)?;
    let db = config.db_path();
    let store = PackageStore::open(&db)
        .with_context(|| format!("failed to open package store {}", db.display()))?;

    let owned = store.count_owned(name)?;
    if owned == 0 {
        let known = store.maintainers()?;
        if known.is_empty() {
            anyhow::bail!("maintainer '{name}' owns no packages");
        }
        anyhow::bail!(
            "maintainer '{name}' owns no packages (known maintainers: {})",
            known.join(", ")
        );
    }
    let moves = store.list_by_maintainer(name, ActionType::Move, FlagFilter::Flagged)?;
    let updates = store.list_by_maintainer(name, ActionType::Update, FlagFilter::Flagged)?;

    if json {
        return print_json(&serde_json::json!({
            "maintainer": name,
            "packages_owned": owned,
            "moves": moves,
            "updates": updates,
        }));
    }

    println!("{name} owns {owned} packages");
    for (action, records) in [(ActionType::Move, &moves), (ActionType::Update, &updates)] {
        println!();
        if records.is_empty() {
            println!("Nothing ready to {action}.");
            continue;
        }
        println!("Ready to {action}:");
        print_table(&["PACKAGE", "FLAG", "LAST SEEN"], rows(records, action));
    }
    Ok(())
}

fn rows(records: &[PackageRecord], action: ActionType) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|r| {
            vec![
                r.package.clone(),
                r.flag(action).as_str().to_string(),
                r.last_seen.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect()
}
