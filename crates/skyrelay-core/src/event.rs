use serde::{Deserialize, Serialize};

/// Message type the remote service uses for topic updates.
pub const TOPIC_UPDATE_TYPE: &str = "ThreadActivity/TopicUpdate";

/// A message carried by a remote event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMessage {
    /// Remote id of the author.
    pub user_id: String,
    /// Remote chat the message was posted in.
    pub chat_id: String,
    /// Raw rich-text markup.
    #[serde(default)]
    pub content: String,
    /// Type discriminator of the message (e.g. `RichText`).
    #[serde(default)]
    pub msg_type: String,
    /// New topic, for topic-update messages.
    #[serde(default)]
    pub topic: Option<String>,
}

impl RemoteMessage {
    /// Creates a `RichText` message.
    pub fn new(
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            msg_type: "RichText".to_string(),
            topic: None,
        }
    }

    /// Builds a topic-update message.
    pub fn topic_update(
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            content: String::new(),
            msg_type: TOPIC_UPDATE_TYPE.to_string(),
            topic: Some(topic.into()),
        }
    }

    /// Classifies the type discriminator.
    pub fn subtype(&self) -> MessageSubtype<'_> {
        if self.msg_type == TOPIC_UPDATE_TYPE {
            MessageSubtype::TopicUpdate
        } else {
            MessageSubtype::Other(&self.msg_type)
        }
    }
}

/// Classification of a generic message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSubtype<'a> {
    /// The chat topic was changed.
    TopicUpdate,
    /// Any subtype the bridge does not relay.
    Other(&'a str),
}

/// A unit of activity pulled from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteEvent {
    /// A new message was posted.
    NewMessage(RemoteMessage),
    /// An existing message was edited.
    EditMessage(RemoteMessage),
    /// Someone is typing.
    Typing {
        /// Who is typing.
        user_id: String,
        /// Where.
        chat_id: String,
    },
    /// A message event of another type, classified by
    /// [`RemoteMessage::subtype`] (topic changes arrive this way).
    Message(RemoteMessage),
    /// Members joined or left a chat.
    MembershipChange {
        /// Chat whose membership changed.
        chat_id: String,
        /// Affected users, when the service reports them.
        #[serde(default)]
        user_ids: Vec<String>,
    },
    /// An event type this bridge does not know.
    Unknown {
        /// Raw type name reported by the service.
        event_type: String,
    },
}

impl RemoteEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &str {
        match self {
            RemoteEvent::NewMessage(_) => "new_message",
            RemoteEvent::EditMessage(_) => "edit_message",
            RemoteEvent::Typing { .. } => "typing",
            RemoteEvent::Message(_) => "message",
            RemoteEvent::MembershipChange { .. } => "membership_change",
            RemoteEvent::Unknown { event_type } => event_type,
        }
    }

    /// The chat the event belongs to, if any.
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            RemoteEvent::NewMessage(m) | RemoteEvent::EditMessage(m) | RemoteEvent::Message(m) => {
                Some(&m.chat_id)
            }
            RemoteEvent::Typing { chat_id, .. } | RemoteEvent::MembershipChange { chat_id, .. } => {
                Some(chat_id)
            }
            RemoteEvent::Unknown { .. } => None,
        }
    }
}

/// A remote chat as listed by the service's "recent chats" view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteChat {
    /// Chat id (the value relays are keyed on).
    pub id: String,
    /// Human-readable topic.
    #[serde(default)]
    pub topic: String,
    /// Group chats can be relayed; one-to-one chats are skipped.
    pub is_group: bool,
}
