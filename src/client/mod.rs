//! The runtime client: readiness tracking, reconciliation and the reconnect loop

pub mod backoff;
pub mod config;
pub mod reconcile;
pub mod session;
pub mod state;

use std::time::Duration;

use tokio::sync::watch;

pub use backoff::ReconnectBackoff;
pub use config::{BackoffConfig, ClientBuilder, ClientConfig, DEFAULT_TUNER_PORT};
pub use reconcile::ReconciliationLoop;
pub use session::ClientSession;
pub use state::{ConnectionState, Readiness};

/// Sleep for `delay`, returning early if exit is signalled
pub(crate) async fn sleep_or_exit(delay: Duration, exit: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        closed = async { exit.wait_for(|&stop| stop).await.is_err() } => {
            // Sender gone: nobody can signal exit any more, finish the sleep
            if closed {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
