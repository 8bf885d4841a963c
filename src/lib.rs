//! Civilization V randomizer client
//!
//! Drives the game's Tuner scripting port to keep a running game in step
//! with a multiworld randomizer session: checked locations go out to the
//! host, received items are granted in game.

pub mod codec;
pub mod error;
pub mod protocol;
pub mod host;
pub mod client;
pub use civ5_catalog as catalog;

pub use error::{Error, Result};
pub use protocol::{
    Directive, GameLink, GrantKind, ModCommand, ReadinessProbe, TunerTransport,
};
pub use host::{ClientMessage, HostEvent, HostSession, NetworkItem, SharedHost};
pub use client::{
    ClientBuilder, ClientConfig, ClientSession, ConnectionState,
    ReconciliationLoop, ReconnectBackoff,
};
