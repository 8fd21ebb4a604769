use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::io;
use crate::types::ActionType;

/// Cycle save-state, persisted as a single JSON document.
///
/// The candidate lists are the raw probe output of the last successful probe
/// per action, kept for display; flags in the store are authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    #[serde(rename = "last-sync", default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(rename = "move", default)]
    pub moves: Vec<String>,
    #[serde(rename = "update", default)]
    pub updates: Vec<String>,
}

impl SaveState {
    /// Load from `path`. A missing or unreadable file yields the default state.
    pub fn load(path: &Path) -> SaveState {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SaveState::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read save data, starting fresh");
                return SaveState::default();
            }
        };
        serde_json::from_str(&data).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "corrupt save data, starting fresh");
            SaveState::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        io::atomic_write(path, &data)
    }

    /// Reconciliation runs when it never ran or last ran before `now - interval`.
    pub fn reconciliation_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_sync {
            None => true,
            Some(last) => last < now - interval,
        }
    }

    pub fn candidates(&self, action: ActionType) -> &[String] {
        match action {
            ActionType::Move => &self.moves,
            ActionType::Update => &self.updates,
        }
    }

    pub fn set_candidates(&mut self, action: ActionType, candidates: Vec<String>) {
        match action {
            ActionType::Move => self.moves = candidates,
            ActionType::Update => self.updates = candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn reads_documents_written_by_older_daemons() {
        let json = r#"{"last-sync":"2024-05-01T10:00:00.000Z","move":["foo"],"update":[]}"#;
        let state: SaveState = serde_json::from_str(json).unwrap();
        assert_eq!(
            state.last_sync,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(state.candidates(ActionType::Move), ["foo".to_string()]);
        assert!(state.candidates(ActionType::Update).is_empty());

        let null_sync: SaveState = serde_json::from_str(r#"{"last-sync":null}"#).unwrap();
        assert_eq!(null_sync, SaveState::default());
    }

    #[test]
    fn load_tolerates_missing_and_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        assert_eq!(SaveState::load(&path), SaveState::default());
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(SaveState::load(&path), SaveState::default());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config/data.json");
        let mut state = SaveState {
            last_sync: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
            ..SaveState::default()
        };
        state.set_candidates(ActionType::Update, vec!["bar".into()]);
        state.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["update"][0], "bar");
        assert!(raw.get("last-sync").is_some());
        assert_eq!(SaveState::load(&path), state);
    }

    #[test]
    fn reconciliation_due_respects_interval() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let two_days = Duration::days(2);
        assert!(SaveState::default().reconciliation_due(now, two_days));

        let recent = SaveState {
            last_sync: Some(now - Duration::days(1)),
            ..SaveState::default()
        };
        assert!(!recent.reconciliation_due(now, two_days));

        let stale = SaveState {
            last_sync: Some(now - Duration::days(2) - Duration::seconds(1)),
            ..SaveState::default()
        };
        assert!(stale.reconciliation_due(now, two_days));
        assert!(recent.reconciliation_due(now, Duration::zero()));
    }
}
