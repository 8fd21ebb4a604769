//! `packy-notify` delivers notify sets to maintainers.
//!
//! ```text
//! NotifySet ──► Notifier::dispatch ──► tokio task
//!                                       ├─► POST <apprise>/notify/              (maintainers with channels)
//!                                       └─► POST <relay>/api/1.0/notifications  (when irc-framework is configured)
//! ```
//!
//! Each POST is retried immediately up to [`MAX_ATTEMPTS`] times, then dropped.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Notifier, MAX_ATTEMPTS};
pub use error::NotifyError;
pub use types::{AppriseRequest, IrcMessage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, NotifyError>;
