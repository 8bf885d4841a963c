pub mod commands;
pub mod probe;
pub mod push_table;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use commands::{pack_grants, GrantKind, ModCommand, MOD_NAMESPACE};
pub use probe::ReadinessProbe;
pub use push_table::{decode_push_table, Directive};
pub use transport::{GameLink, TunerTransport};
