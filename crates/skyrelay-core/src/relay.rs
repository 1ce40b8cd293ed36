use crate::error::{RelayError, RelayResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Remote group-chat ids look like `19:abcdef@thread.skype`.
#[allow(clippy::expect_used)]
static ROOM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+:[^@ ]+@.+").expect("room id pattern is valid"));

/// Returns `true` if `room_id` has the `<numeric>:<token>@<suffix>` shape
/// of a remote group-chat id.
pub fn is_valid_room_id(room_id: &str) -> bool {
    ROOM_ID_PATTERN.is_match(room_id)
}

/// A persisted link between one local channel and one remote chat room.
///
/// The triple is the identity: two relays are equal when all three fields are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relay {
    /// Name of the local IRC network.
    pub network: String,
    /// Local channel name (e.g. `#test`).
    pub channel: String,
    /// Opaque remote chat id.
    pub remote_room_id: String,
}

impl Relay {
    /// Creates a relay without validating it; see [`Relay::validate`].
    pub fn new(
        network: impl Into<String>,
        channel: impl Into<String>,
        remote_room_id: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            channel: channel.into(),
            remote_room_id: remote_room_id.into(),
        }
    }

    /// Validates the remote room id and that no field contains whitespace,
    /// since the store format is space-separated.
    pub fn validate(&self) -> RelayResult<()> {
        if !is_valid_room_id(&self.remote_room_id) {
            return Err(RelayError::Validation(format!(
                "Invalid remote chat id: {}",
                self.remote_room_id
            )));
        }
        for (name, value) in [("network", &self.network), ("channel", &self.channel)] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(RelayError::Validation(format!("Invalid {name}: {value:?}")));
            }
        }
        if self.remote_room_id.chars().any(char::is_whitespace) {
            return Err(RelayError::Validation(format!(
                "Invalid remote chat id: {}",
                self.remote_room_id
            )));
        }
        Ok(())
    }

    /// Parses one `network channel roomId` record of the relay store.
    pub fn from_record(line: &str) -> RelayResult<Self> {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next(), fields.next()) {
            (Some(network), Some(channel), Some(room), None) => {
                Ok(Self::new(network, channel, room))
            }
            _ => Err(RelayError::MalformedRecord(format!(
                "expected 3 fields, got {:?}",
                line.trim_end()
            ))),
        }
    }

    /// Renders the relay as a store record (without trailing newline).
    pub fn to_record(&self) -> String {
        format!("{} {} {}", self.network, self.channel, self.remote_room_id)
    }

    /// Whether this relay links the given local channel.
    pub fn is_local(&self, network: &str, channel: &str) -> bool {
        self.network == network && self.channel == channel
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} <-> {}",
            self.channel, self.network, self.remote_room_id
        )
    }
}
