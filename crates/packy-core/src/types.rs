use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

/// The two independent kinds of pending work a package can be flagged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Package can be moved between repositories (e.g. staging → stable).
    Move,
    /// Package has a newer upstream version to build.
    Update,
}

impl ActionType {
    pub fn all() -> &'static [ActionType] {
        &[ActionType::Move, ActionType::Update]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Move => "move",
            ActionType::Update => "update",
        }
    }

    /// Flag column backing this action in the `packages` table.
    pub(crate) fn column(self) -> &'static str {
        match self {
            ActionType::Move => "move_flag",
            ActionType::Update => "update_flag",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
