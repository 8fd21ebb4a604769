use std::sync::Arc;
use std::time::Duration;

use packy_core::{Config, NotifySet, NotifySink};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::NotifyError;
use crate::types::{AppriseRequest, IrcMessage};
use crate::Result;

/// Attempts per delivery before a notification is dropped.
pub const MAX_ATTEMPTS: u32 = 25;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers notify sets to Apprise and to the IRC relay.
///
/// Cloning is cheap; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    apprise: Option<String>,
    irc_gateway: Option<String>,
    max_attempts: u32,
}

impl Notifier {
    pub fn new(apprise: Option<String>, irc_gateway: Option<String>) -> Result<Self> {
        Self::with_max_attempts(apprise, irc_gateway, MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(
        apprise: Option<String>,
        irc_gateway: Option<String>,
        max_attempts: u32,
    ) -> Result<Self> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                apprise: apprise.map(|u| u.trim_end_matches('/').to_string()),
                irc_gateway: irc_gateway.map(|u| u.trim_end_matches('/').to_string()),
                max_attempts: max_attempts.max(1),
            }),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.apprise.clone(), config.irc_gateway())
    }

    /// Whether any delivery channel is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.inner.apprise.is_some() || self.inner.irc_gateway.is_some()
    }

    /// Send `set` through Apprise. Returns `Ok(false)` when Apprise is not
    /// configured or the maintainer has no channels.
    pub async fn send_apprise(&self, set: &NotifySet) -> Result<bool> {
        let Some(api) = &self.inner.apprise else {
            return Ok(false);
        };
        let Some(body) = AppriseRequest::from_set(set) else {
            return Ok(false);
        };
        let url = format!("{api}/notify/");
        self.post_with_retry("apprise", &url, &body).await?;
        Ok(true)
    }

    /// Send `set` to the IRC relay. Returns `Ok(false)` when IRC is disabled.
    pub async fn send_irc(&self, set: &NotifySet) -> Result<bool> {
        let Some(gateway) = &self.inner.irc_gateway else {
            return Ok(false);
        };
        let Some(body) = IrcMessage::from_set(set) else {
            return Ok(false);
        };
        let url = format!("{gateway}/api/1.0/notifications");
        self.post_with_retry("irc", &url, &body).await?;
        Ok(true)
    }

    /// Deliver to every configured channel concurrently. Failures are logged
    /// and dropped.
    pub async fn deliver(&self, set: &NotifySet) {
        let (apprise, irc) = futures::future::join(self.send_apprise(set), self.send_irc(set)).await;
        for (channel, result) in [("apprise", apprise), ("irc", irc)] {
            match result {
                Ok(true) => info!(
                    channel,
                    maintainer = %set.maintainer.name,
                    action = %set.action,
                    count = set.packages.len(),
                    "notification sent"
                ),
                Ok(false) => {}
                Err(e) => error!(
                    channel,
                    maintainer = %set.maintainer.name,
                    error = %e,
                    "notification dropped"
                ),
            }
        }
    }

    async fn post_with_retry<T: Serialize>(
        &self,
        target: &'static str,
        url: &str,
        body: &T,
    ) -> Result<u32> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.inner.http.post(url).json(body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(channel = target, attempt, "delivered");
                    return Ok(attempt);
                }
                Ok(resp) => NotifyError::Status {
                    url: url.to_string(),
                    status: resp.status().as_u16(),
                },
                Err(e) => NotifyError::Http(e),
            };
            warn!(channel = target, attempt, error = %err, "failed to send notification");
            if attempt >= self.inner.max_attempts {
                return Err(NotifyError::GaveUp {
                    target,
                    attempts: attempt,
                    last: err.to_string(),
                });
            }
        }
    }
}

impl NotifySink for Notifier {
    fn dispatch(&self, set: NotifySet) {
        let this = self.clone();
        tokio::spawn(async move {
            this.deliver(&set).await;
        });
    }
}
