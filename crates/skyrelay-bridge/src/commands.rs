//! Owner-only commands for managing relays and discovering chat ids.

use crate::registry::RelayRegistry;
use crate::session::SessionManager;
use skyrelay_core::{Relay, RelayError, RelayResult};
use std::sync::Arc;

/// Reply to a successful mutating command.
pub const SUCCESS_REPLY: &str = "The operation succeeded.";
/// Reply to `relay list` with nothing configured.
pub const NO_RELAYS_REPLY: &str = "There are currently no configured relays.";
/// Reply to `chat recent` with no group chats.
pub const NO_CHATS_REPLY: &str = "There are no recent chats. Try sending a message on Skype.";

/// Where and by whom a command was invoked.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Network the command came from; default for `relay add/remove`.
    pub network: String,
    /// Channel the command came from, if it was sent in a channel.
    pub channel: Option<String>,
    /// Nick of the invoking user.
    pub sender: String,
    /// Whether the host framework recognises the sender as the bot owner.
    pub is_owner: bool,
}

impl CommandContext {
    fn require_owner(&self) -> RelayResult<()> {
        if self.is_owner {
            Ok(())
        } else {
            Err(RelayError::Unauthorized(format!(
                "{} is not allowed to manage relays",
                self.sender
            )))
        }
    }

    fn target(&self, network: Option<&str>, channel: Option<&str>) -> RelayResult<(String, String)> {
        let network = network.unwrap_or(self.network.as_str()).to_string();
        let channel = channel
            .or(self.channel.as_deref())
            .ok_or_else(|| RelayError::Validation("A channel is required here".to_string()))?
            .to_string();
        Ok((network, channel))
    }
}

/// `relay` and `chat` command handlers.
pub struct RelayCommands {
    registry: Arc<RelayRegistry>,
    sessions: Arc<SessionManager>,
}

impl RelayCommands {
    /// Binds the handlers to a registry and session manager.
    pub fn new(registry: Arc<RelayRegistry>, sessions: Arc<SessionManager>) -> Self {
        Self { registry, sessions }
    }

    /// `relay add [<network>] [<channel>] <chat id>`
    pub fn add(
        &self,
        ctx: &CommandContext,
        network: Option<&str>,
        channel: Option<&str>,
        room_id: &str,
    ) -> RelayResult<String> {
        ctx.require_owner()?;
        let (network, channel) = ctx.target(network, channel)?;
        self.registry.add(Relay::new(network, channel, room_id))?;
        Ok(SUCCESS_REPLY.to_string())
    }

    /// `relay remove [<network>] [<channel>] <chat id>`
    pub fn remove(
        &self,
        ctx: &CommandContext,
        network: Option<&str>,
        channel: Option<&str>,
        room_id: &str,
    ) -> RelayResult<String> {
        ctx.require_owner()?;
        let (network, channel) = ctx.target(network, channel)?;
        match self.registry.remove(&Relay::new(network, channel, room_id)) {
            Ok(()) => Ok(SUCCESS_REPLY.to_string()),
            Err(RelayError::NotFound(_)) => Err(RelayError::NotFound(
                "This relay already does not exist.".to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    /// `relay list`
    pub fn list(&self, ctx: &CommandContext) -> RelayResult<Vec<String>> {
        ctx.require_owner()?;
        let relays = self.registry.list()?;
        if relays.is_empty() {
            return Ok(vec![NO_RELAYS_REPLY.to_string()]);
        }
        Ok(relays.iter().map(ToString::to_string).collect())
    }

    /// `chat recent`: recent group chats with their ids, so they can be
    /// used in `relay add`.
    pub async fn recent_chats(&self, ctx: &CommandContext) -> RelayResult<Vec<String>> {
        ctx.require_owner()?;
        let session = self.sessions.get_session().await?;
        let replies: Vec<String> = session
            .session()
            .recent_chats()
            .await?
            .into_iter()
            .filter(|chat| chat.is_group)
            .map(|chat| format!("\x02{}\x02 ({})", chat.topic, chat.id))
            .collect();
        if replies.is_empty() {
            return Ok(vec![NO_CHATS_REPLY.to_string()]);
        }
        Ok(replies)
    }
}
