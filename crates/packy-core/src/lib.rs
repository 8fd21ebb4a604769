//! Core of the packy notifier: the package store, the flag lifecycle, the
//! ownership reconciler, the update prober and the cycle scheduler that
//! drives them.

pub mod config;
pub mod error;
pub mod flags;
pub mod io;
pub mod notify;
pub mod paths;
pub mod probe;
pub mod process;
pub mod reconcile;
pub mod savestate;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod types;

pub use config::{Config, Maintainer};
pub use error::{PackyError, Result};
pub use flags::{Flag, FlagEngine, FlagFilter};
pub use notify::{NotifySet, NotifySink};
pub use scheduler::{CycleOutcome, CycleReport, CycleScheduler};
pub use store::{PackageRecord, PackageStore};
pub use types::ActionType;
