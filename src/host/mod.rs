//! The randomizer host session, as seen from the client
//!
//! The host owns the multiworld connection and the received-items ledger.
//! The client only reads snapshots of that state and queues messages back.

pub mod bridge;
pub mod shared;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;

pub use bridge::run_bridge;
pub use shared::{HostEvent, SharedHost};

/// `StatusUpdate` value for a completed goal
pub const CLIENT_GOAL: u8 = 30;

/// An item sent to this slot by the multiworld
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkItem {
    pub item: i64,
    #[serde(default)]
    pub location: i64,
    #[serde(default)]
    pub player: i64,
    #[serde(default)]
    pub flags: i64,
}

impl NetworkItem {
    pub fn new(item: i64) -> Self {
        Self { item, location: 0, player: 0, flags: 0 }
    }
}

/// Messages the client asks the host to send to the multiworld server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ClientMessage {
    LocationChecks { locations: Vec<i64> },
    StatusUpdate { status: u8 },
    /// Ask the server to resend the full item ledger
    Sync,
}

impl ClientMessage {
    pub fn goal_complete() -> Self {
        ClientMessage::StatusUpdate { status: CLIENT_GOAL }
    }
}

pub trait HostSession: Send + Sync {
    fn exit_requested(&self) -> bool;

    /// Flips to `true` once when the host asks the client to stop
    fn subscribe_exit(&self) -> watch::Receiver<bool>;

    /// A slot is authenticated and the server connection is up
    fn is_slot_connected(&self) -> bool;

    /// Randomizer-global ids of every location this slot has checked
    fn checked_locations(&self) -> BTreeSet<i64>;

    fn items_received_len(&self) -> usize;

    /// Snapshot of the ledger from `start` onwards
    fn items_received_from(&self, start: usize) -> Vec<NetworkItem>;

    fn send_messages(&self, messages: Vec<ClientMessage>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_shape() {
        let checks = ClientMessage::LocationChecks { locations: vec![140319, 140320] };
        assert_eq!(
            serde_json::to_value(&checks).unwrap(),
            json!({"cmd": "LocationChecks", "locations": [140319, 140320]})
        );
        assert_eq!(
            serde_json::to_value(ClientMessage::goal_complete()).unwrap(),
            json!({"cmd": "StatusUpdate", "status": 30})
        );
        assert_eq!(serde_json::to_value(ClientMessage::Sync).unwrap(), json!({"cmd": "Sync"}));
    }

    #[test]
    fn test_network_item_ignores_extra_fields() {
        let item: NetworkItem =
            serde_json::from_value(json!({"item": 140400, "location": 5, "player": 2, "flags": 1, "class": "NetworkItem"}))
                .unwrap();
        assert_eq!(item.item, 140400);
        assert_eq!(item.player, 2);
    }
}
