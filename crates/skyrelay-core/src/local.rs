use serde::{Deserialize, Serialize};

/// Returns `true` if `name` looks like an IRC channel name.
pub fn is_channel_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some('#' | '&' | '+' | '!') => {}
        _ => return false,
    }
    name.len() > 1 && !name.contains([' ', ',', '\x07'])
}

/// What kind of local activity a [`LocalMessage`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalMessageKind {
    /// A regular channel message.
    Message,
    /// A `/me` action.
    Action,
    /// A notice.
    Notice,
    /// A topic change; `text` holds the new topic.
    Topic,
}

/// Inbound activity on a local channel, as handed over by the hosting
/// framework once per message, notice or topic change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMessage {
    /// Local network the activity happened on.
    pub network: String,
    /// Channel the activity happened in.
    pub channel: String,
    /// Nick of the sender; `None` for simulated echoes of the bot's own lines.
    pub sender: Option<String>,
    /// Message text (action text without the CTCP wrapper).
    pub text: String,
    /// What kind of activity this is.
    pub kind: LocalMessageKind,
    /// Set when the line was posted by this bridge (a relayed remote message).
    #[serde(default)]
    pub relayed: bool,
}

impl LocalMessage {
    fn build(
        kind: LocalMessageKind,
        network: impl Into<String>,
        channel: impl Into<String>,
        sender: Option<&str>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            channel: channel.into(),
            sender: sender.map(str::to_string),
            text: text.into(),
            kind,
            relayed: false,
        }
    }

    /// Creates a regular channel message.
    pub fn message(
        network: impl Into<String>,
        channel: impl Into<String>,
        sender: Option<&str>,
        text: impl Into<String>,
    ) -> Self {
        Self::build(LocalMessageKind::Message, network, channel, sender, text)
    }

    /// Creates a `/me` action.
    pub fn action(
        network: impl Into<String>,
        channel: impl Into<String>,
        sender: Option<&str>,
        text: impl Into<String>,
    ) -> Self {
        Self::build(LocalMessageKind::Action, network, channel, sender, text)
    }

    /// Creates a notice.
    pub fn notice(
        network: impl Into<String>,
        channel: impl Into<String>,
        sender: Option<&str>,
        text: impl Into<String>,
    ) -> Self {
        Self::build(LocalMessageKind::Notice, network, channel, sender, text)
    }

    /// Creates a topic change.
    pub fn topic(
        network: impl Into<String>,
        channel: impl Into<String>,
        sender: Option<&str>,
        topic: impl Into<String>,
    ) -> Self {
        Self::build(LocalMessageKind::Topic, network, channel, sender, topic)
    }

    /// Marks the message as posted by the bridge itself.
    pub fn mark_relayed(mut self) -> Self {
        self.relayed = true;
        self
    }
}

/// A line to post in a local channel.
///
/// Deliveries are always bridge-originated; hosts must tag the resulting
/// message so it comes back with [`LocalMessage::relayed`] set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDelivery {
    /// Local network to post on.
    pub network: String,
    /// Target channel.
    pub channel: String,
    /// Line to post.
    pub text: String,
}

impl LocalDelivery {
    /// Creates a delivery of `text` to `channel` on `network`.
    pub fn new(
        network: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            channel: channel.into(),
            text: text.into(),
        }
    }
}
