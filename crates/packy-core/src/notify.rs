use serde::Serialize;

use crate::config::Maintainer;
use crate::types::ActionType;

/// Packages that just became actionable for one maintainer and one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifySet {
    pub maintainer: Maintainer,
    pub action: ActionType,
    pub packages: Vec<String>,
}

impl NotifySet {
    /// `"<name>: packages ready to <action>"`, using the IRC alias when `irc`.
    pub fn headline(&self, irc: bool) -> String {
        let who = if irc {
            self.maintainer.irc_name()
        } else {
            &self.maintainer.name
        };
        format!("{who}: packages ready to {}", self.action)
    }
}

/// Destination for notify sets produced by a cycle.
///
/// `dispatch` must not block the cycle: implementations hand delivery off to
/// their own tasks and swallow delivery failures after logging them.
pub trait NotifySink: Send + Sync {
    fn dispatch(&self, set: NotifySet);
}

/// Sink that drops every set. Used when no notification channel is configured.
pub struct NullSink;

impl NotifySink for NullSink {
    fn dispatch(&self, set: NotifySet) {
        tracing::debug!(
            maintainer = %set.maintainer.name,
            action = %set.action,
            count = set.packages.len(),
            "no notifier configured, dropping notify set"
        );
    }
}
