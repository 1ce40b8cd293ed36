use async_trait::async_trait;
use skyrelay_core::{RelayResult, RemoteChat, RemoteEvent};
use std::sync::Arc;

/// Entry point of the remote messaging service.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Logs in and returns a fresh session.
    ///
    /// Rejected credentials must be reported as
    /// [`RelayError::Authentication`](skyrelay_core::RelayError::Authentication).
    async fn login(&self, username: &str, password: &str) -> RelayResult<Arc<dyn RemoteSession>>;
}

/// A live, authenticated connection to the remote service.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// The remote user id this session is logged in as.
    fn user_id(&self) -> &str;

    /// Waits for the next batch of events, returning at the latest when the
    /// service's own long-poll timeout expires (possibly with no events).
    async fn pull_events(&self) -> RelayResult<Vec<RemoteEvent>>;

    /// Posts rich-text markup to a chat.
    ///
    /// Failures are reported as
    /// [`RelayError::Delivery`](skyrelay_core::RelayError::Delivery).
    async fn send_message(&self, room_id: &str, content: &str) -> RelayResult<()>;

    /// Chats the account was recently active in.
    async fn recent_chats(&self) -> RelayResult<Vec<RemoteChat>>;
}
