use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::{Error, Result};
use crate::host::{ClientMessage, HostSession, NetworkItem};

/// Server packets the host forwards to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum HostEvent {
    Connected {
        slot: u32,
        #[serde(default)]
        slot_data: Value,
        #[serde(default)]
        checked_locations: Vec<i64>,
    },
    ReceivedItems {
        index: usize,
        items: Vec<NetworkItem>,
    },
    RoomUpdate {
        #[serde(default)]
        checked_locations: Vec<i64>,
    },
    Disconnected,
    Exit,
}

#[derive(Debug, Default)]
struct HostState {
    slot: Option<u32>,
    slot_data: Value,
    checked_locations: BTreeSet<i64>,
    items_received: Vec<NetworkItem>,
}

struct Inner {
    state: Mutex<HostState>,
    outbox: mpsc::UnboundedSender<ClientMessage>,
    exit_tx: watch::Sender<bool>,
}

/// In-memory host session
///
/// Cloned handles share one state. The host side feeds it [`HostEvent`]s;
/// messages queued by the client come out of the receiver returned by
/// [`SharedHost::new`].
#[derive(Clone)]
pub struct SharedHost {
    inner: Arc<Inner>,
}

impl SharedHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let (exit_tx, _) = watch::channel(false);
        let host = Self {
            inner: Arc::new(Inner {
                state: Mutex::new(HostState::default()),
                outbox,
                exit_tx,
            }),
        };
        (host, outbox_rx)
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn apply(&self, event: HostEvent) {
        match event {
            HostEvent::Connected { slot, slot_data, checked_locations } => {
                tracing::info!(slot, "connected to multiworld");
                let mut state = self.state();
                state.slot = Some(slot);
                state.slot_data = slot_data;
                state.checked_locations = checked_locations.into_iter().collect();
            }
            HostEvent::ReceivedItems { index, items } => {
                let resync = {
                    let mut state = self.state();
                    if index == 0 {
                        state.items_received = items;
                        false
                    } else if index == state.items_received.len() {
                        state.items_received.extend(items);
                        false
                    } else {
                        tracing::warn!(
                            index,
                            known = state.items_received.len(),
                            "received items out of order, requesting resync"
                        );
                        true
                    }
                };
                if resync {
                    let _ = self.inner.outbox.send(ClientMessage::Sync);
                }
            }
            HostEvent::RoomUpdate { checked_locations } => {
                self.state().checked_locations.extend(checked_locations);
            }
            HostEvent::Disconnected => {
                tracing::info!("disconnected from multiworld");
                self.state().slot = None;
            }
            HostEvent::Exit => self.request_exit(),
        }
    }

    pub fn request_exit(&self) {
        self.inner.exit_tx.send_replace(true);
    }

    pub fn slot_data(&self) -> Value {
        self.state().slot_data.clone()
    }
}

impl HostSession for SharedHost {
    fn exit_requested(&self) -> bool {
        *self.inner.exit_tx.borrow()
    }

    fn subscribe_exit(&self) -> watch::Receiver<bool> {
        self.inner.exit_tx.subscribe()
    }

    fn is_slot_connected(&self) -> bool {
        self.state().slot.is_some()
    }

    fn checked_locations(&self) -> BTreeSet<i64> {
        self.state().checked_locations.clone()
    }

    fn items_received_len(&self) -> usize {
        self.state().items_received.len()
    }

    fn items_received_from(&self, start: usize) -> Vec<NetworkItem> {
        self.state().items_received.get(start..).map(<[NetworkItem]>::to_vec).unwrap_or_default()
    }

    fn send_messages(&self, messages: Vec<ClientMessage>) -> Result<()> {
        for message in messages {
            self.inner
                .outbox
                .send(message)
                .map_err(|_| Error::Host("outbox closed".into()))?;
        }
        Ok(())
    }
}
