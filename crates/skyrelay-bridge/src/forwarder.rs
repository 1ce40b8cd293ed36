use crate::local::LocalNetwork;
use crate::registry::RelayRegistry;
use crate::session::SessionManager;
use crate::transcode::Transcoder;
use skyrelay_core::{LocalMessage, LocalMessageKind, RelayError, RelayResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pushes local channel activity to the linked remote chats.
pub struct Forwarder {
    registry: Arc<RelayRegistry>,
    sessions: Arc<SessionManager>,
    local: Arc<dyn LocalNetwork>,
    transcoder: Arc<Transcoder>,
}

impl Forwarder {
    pub fn new(
        registry: Arc<RelayRegistry>,
        sessions: Arc<SessionManager>,
        local: Arc<dyn LocalNetwork>,
        transcoder: Arc<Transcoder>,
    ) -> Self {
        Self {
            registry,
            sessions,
            local,
            transcoder,
        }
    }

    /// Formats a local message the way it appears in the remote chat.
    pub fn format_line(&self, msg: &LocalMessage) -> String {
        let nick = msg
            .sender
            .clone()
            .unwrap_or_else(|| self.local.own_nick(&msg.network));
        match msg.kind {
            LocalMessageKind::Message | LocalMessageKind::Notice => {
                format!("<{nick}> {}", msg.text)
            }
            LocalMessageKind::Action => format!("* {nick} {}", msg.text),
            LocalMessageKind::Topic => format!("--- {nick} changed the topic to: {}", msg.text),
        }
    }

    /// Forwards `msg` to every remote chat linked to its channel.
    ///
    /// Lines posted by the bridge itself are dropped. A failed send is
    /// reported in the local channel and collected in the returned list
    /// without stopping delivery to the remaining chats; failing to obtain
    /// a session at all is returned as an error.
    pub async fn forward(&self, msg: &LocalMessage) -> RelayResult<Vec<RelayError>> {
        if msg.relayed {
            debug!(network = %msg.network, channel = %msg.channel, "Skipping relayed line");
            return Ok(Vec::new());
        }

        let relays = self.registry.matching_channel(&msg.network, &msg.channel)?;
        if relays.is_empty() {
            return Ok(Vec::new());
        }

        let line = self.format_line(msg);
        let mut errors = Vec::new();
        for relay in &relays {
            let content = self.transcoder.to_remote(&line);
            let session = self.sessions.get_session().await?;
            if let Err(e) = self
                .sessions
                .send_message(&session, &relay.remote_room_id, &content)
                .await
            {
                warn!(relay = %relay, error = %e, "Failed to relay message");
                self.local.report_error(
                    &msg.network,
                    &msg.channel,
                    &format!("Failed to relay message: {e}"),
                );
                errors.push(e);
            }
        }
        Ok(errors)
    }
}
