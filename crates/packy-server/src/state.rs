use std::sync::Arc;

use packy_core::savestate::SaveState;
use packy_core::{Config, PackageStore};
use tokio::sync::RwLock;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PackageStore>,
    /// Written by the cycle scheduler, read here.
    pub save_state: Arc<RwLock<SaveState>>,
    /// Sorted configured maintainer names.
    pub maintainers: Arc<Vec<String>>,
    pub metric_prefix: Arc<str>,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<PackageStore>,
        save_state: Arc<RwLock<SaveState>>,
    ) -> Self {
        Self {
            store,
            save_state,
            maintainers: Arc::new(config.maintainer_names()),
            metric_prefix: Arc::from(config.metric_prefix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packy_core::Maintainer;

    #[test]
    fn maintainers_are_sorted_names() {
        let config = Config {
            maintainers: vec![Maintainer::named("zed"), Maintainer::named("alice")],
            ..Config::default()
        };
        let state = AppState::new(
            &config,
            Arc::new(PackageStore::open_in_memory().unwrap()),
            Arc::new(RwLock::new(SaveState::default())),
        );
        assert_eq!(*state.maintainers, vec!["alice".to_string(), "zed".to_string()]);
    }
}
