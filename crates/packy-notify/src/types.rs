use packy_core::NotifySet;
use serde::{Deserialize, Serialize};

/// Trailer marking the end of a multi-line IRC relay message.
pub const IRC_EOF: &str = "-------- EOF --------";

/// Body of `POST <apprise>/notify/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppriseRequest {
    pub title: String,
    pub body: String,
    /// Comma-separated Apprise URLs.
    pub urls: String,
}

impl AppriseRequest {
    /// `None` when the maintainer has no channels to notify.
    pub fn from_set(set: &NotifySet) -> Option<Self> {
        if set.maintainer.channels.is_empty() || set.packages.is_empty() {
            return None;
        }
        Some(Self {
            title: set.headline(false),
            body: set.packages.join("\n"),
            urls: set.maintainer.channels.join(","),
        })
    }
}

/// Body of `POST <relay>/api/1.0/notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrcMessage {
    pub message: String,
}

impl IrcMessage {
    pub fn from_set(set: &NotifySet) -> Option<Self> {
        if set.packages.is_empty() {
            return None;
        }
        Some(Self {
            message: format!(
                "{}\n{}\n{IRC_EOF}",
                set.headline(true),
                set.packages.join("\n")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packy_core::{ActionType, Maintainer};

    fn set(maintainer: Maintainer) -> NotifySet {
        NotifySet {
            maintainer,
            action: ActionType::Move,
            packages: vec!["foo".into(), "bar".into()],
        }
    }

    #[test]
    fn apprise_request_joins_packages_and_channels() {
        let mut bob = Maintainer::named("bob");
        bob.channels = vec!["mailto://bob@example.org".into(), "tgram://x/y".into()];
        bob.irc_name = Some("bobby".into());
        let req = AppriseRequest::from_set(&set(bob)).unwrap();
        assert_eq!(req.title, "bob: packages ready to move");
        assert_eq!(req.body, "foo\nbar");
        assert_eq!(req.urls, "mailto://bob@example.org,tgram://x/y");
    }

    #[test]
    fn apprise_request_needs_channels() {
        assert!(AppriseRequest::from_set(&set(Maintainer::named("alice"))).is_none());
    }

    #[test]
    fn irc_message_uses_alias_and_trailer() {
        let msg = IrcMessage::from_set(&set(Maintainer::orphan())).unwrap();
        assert_eq!(
            msg.message,
            "orphaned: packages ready to move\nfoo\nbar\n-------- EOF --------"
        );
    }
}
