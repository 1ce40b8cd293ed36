use skyrelay_core::{is_channel_name, LocalDelivery};

/// The hosting IRC framework, as seen by the bridge.
///
/// Implementations must tag every [`deliver`](LocalNetwork::deliver)ed line
/// so that its echo comes back as a [`LocalMessage`](skyrelay_core::LocalMessage)
/// with `relayed` set; the outbound forwarder drops those.
pub trait LocalNetwork: Send + Sync {
    /// Whether the framework is connected to a network with this name.
    fn has_network(&self, network: &str) -> bool;

    /// Whether `name` is a valid channel name on `network`.
    fn is_channel(&self, _network: &str, name: &str) -> bool {
        is_channel_name(name)
    }

    /// The bot's own nick on `network`.
    fn own_nick(&self, network: &str) -> String;

    /// Queues a bridge-originated line. Fire-and-forget.
    fn deliver(&self, delivery: LocalDelivery);

    /// Shows an error to the users of a local channel.
    fn report_error(&self, network: &str, channel: &str, message: &str);
}
