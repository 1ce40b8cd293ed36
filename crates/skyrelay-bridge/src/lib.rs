//! Relay bridge between IRC channels and Skype group chats.
//!
//! The hosting IRC framework and the remote service client are external
//! collaborators, modelled by the [`LocalNetwork`], [`RemoteClient`] and
//! [`RemoteSession`] traits. Everything in between lives here.
//!
//! # Main types
//!
//! - [`Bridge`]: One bridge instance, owning the poll loop.
//! - [`RelayRegistry`]: Durable mapping of local channels to remote chats.
//! - [`SessionManager`]: Remote session lifecycle, including hourly renewal.
//! - [`Dispatcher`]: Remote events to local lines, with echo suppression.
//! - [`Forwarder`]: Local activity to remote chats.
//! - [`Transcoder`]: Rich-text markup <-> IRC formatting.

/// The bridge instance and poll loop.
pub mod bridge;
/// Owner-only relay and chat commands.
pub mod commands;
/// TOML configuration.
pub mod config;
/// Remote event dispatch.
pub mod dispatcher;
/// Outbound forwarding.
pub mod forwarder;
/// Per-user coloured labels.
pub mod label;
/// The hosting IRC framework contract.
pub mod local;
/// Relay registry and stores.
pub mod registry;
/// The remote service contract.
pub mod remote;
/// Remote session management.
pub mod session;
/// Text format conversion.
pub mod transcode;

pub use bridge::{Bridge, InstanceSlot};
pub use commands::{CommandContext, RelayCommands};
pub use config::{AuthConfig, BridgeConfig};
pub use dispatcher::Dispatcher;
pub use forwarder::Forwarder;
pub use label::UserLabels;
pub use local::LocalNetwork;
pub use registry::{FileRelayStore, MemoryRelayStore, RelayRegistry, RelayStore};
pub use remote::{RemoteClient, RemoteSession};
pub use session::{Credentials, SessionHandle, SessionManager, SESSION_RENEWAL_INTERVAL};
pub use transcode::Transcoder;
