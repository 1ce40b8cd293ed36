use crate::label::UserLabels;
use crate::local::LocalNetwork;
use crate::registry::RelayRegistry;
use crate::transcode::Transcoder;
use skyrelay_core::{LocalDelivery, MessageSubtype, RelayResult, RemoteEvent, RemoteMessage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Notice relayed when members join or leave a remote chat.
pub const MEMBERSHIP_NOTICE: &str = "[chat group update]";

/// Turns remote events into local deliveries.
///
/// Every event is handled once: it is classified, formatted and delivered
/// to each local channel linked to its chat. Nothing is retried.
pub struct Dispatcher {
    registry: Arc<RelayRegistry>,
    local: Arc<dyn LocalNetwork>,
    transcoder: Arc<Transcoder>,
    labels: UserLabels,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<RelayRegistry>,
        local: Arc<dyn LocalNetwork>,
        transcoder: Arc<Transcoder>,
    ) -> Self {
        Self {
            registry,
            local,
            transcoder,
            labels: UserLabels::default(),
        }
    }

    /// Handles one event and returns the number of local deliveries made.
    ///
    /// Messages authored by `own_user_id` are the bridge's own relayed
    /// traffic and are never delivered back.
    pub fn dispatch(&self, event: &RemoteEvent, own_user_id: &str) -> RelayResult<usize> {
        let (chat_id, line) = match event {
            RemoteEvent::NewMessage(msg) | RemoteEvent::EditMessage(msg)
                if msg.user_id == own_user_id =>
            {
                debug!(chat_id = %msg.chat_id, "Skipping own message");
                return Ok(0);
            }
            RemoteEvent::NewMessage(msg) => (&msg.chat_id, self.format_message(msg, false)),
            RemoteEvent::EditMessage(msg) => (&msg.chat_id, self.format_message(msg, true)),
            RemoteEvent::Typing { .. } => return Ok(0),
            RemoteEvent::Message(msg) => match msg.subtype() {
                MessageSubtype::TopicUpdate => (&msg.chat_id, self.format_topic(msg)),
                MessageSubtype::Other(msg_type) => {
                    warn!(msg_type = %msg_type, chat_id = %msg.chat_id, "Unknown event message type");
                    return Ok(0);
                }
            },
            RemoteEvent::MembershipChange { chat_id, .. } => {
                (chat_id, MEMBERSHIP_NOTICE.to_string())
            }
            RemoteEvent::Unknown { event_type } => {
                warn!(event_type = %event_type, "Unknown remote event");
                return Ok(0);
            }
        };

        self.deliver(chat_id, &line)
    }

    fn deliver(&self, chat_id: &str, line: &str) -> RelayResult<usize> {
        let relays = self.registry.matching_room(chat_id)?;
        for relay in &relays {
            self.local
                .deliver(LocalDelivery::new(&relay.network, &relay.channel, line));
        }
        Ok(relays.len())
    }

    fn format_message(&self, msg: &RemoteMessage, edited: bool) -> String {
        let label = self.labels.label(&msg.user_id);
        let content = self.transcoder.to_local(&msg.content);
        if edited {
            format!("<{label} (edited)> {content}")
        } else {
            format!("<{label}> {content}")
        }
    }

    fn format_topic(&self, msg: &RemoteMessage) -> String {
        format!(
            "--- {} changed the topic to: {}",
            self.labels.label(&msg.user_id),
            msg.topic.as_deref().unwrap_or_default()
        )
    }
}
