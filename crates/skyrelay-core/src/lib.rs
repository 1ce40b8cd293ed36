//! Core types and error definitions for the Skyrelay bridge.
//!
//! This crate provides the foundational types shared by the bridge and the
//! command-line tool: error handling, relay links, remote-service events and
//! the local (IRC) side message shapes.
//!
//! # Main types
//!
//! - [`RelayError`]: Unified error enum for all Skyrelay subsystems.
//! - [`RelayResult`]: Convenience alias for `Result<T, RelayError>`.
//! - [`Relay`]: A persisted link between a local channel and a remote chat.
//! - [`RemoteEvent`]: A unit of activity pulled from the remote service.
//! - [`LocalMessage`]: Inbound activity observed on a local channel.
//! - [`LocalDelivery`]: A line the bridge wants posted to a local channel.

/// Error types.
pub mod error;
/// Remote-service event model.
pub mod event;
/// Local (IRC) side message types.
pub mod local;
/// Relay links and room-id validation.
pub mod relay;

pub use error::{RelayError, RelayResult};
pub use event::{MessageSubtype, RemoteChat, RemoteEvent, RemoteMessage, TOPIC_UPDATE_TYPE};
pub use local::{is_channel_name, LocalDelivery, LocalMessage, LocalMessageKind};
pub use relay::{is_valid_room_id, Relay};
