use std::sync::Arc;

use civ5_catalog::Catalog;

use crate::client::backoff::ReconnectBackoff;
use crate::client::config::ClientConfig;
use crate::client::reconcile::ReconciliationLoop;
use crate::client::sleep_or_exit;
use crate::host::HostSession;
use crate::protocol::TunerTransport;

/// Owns the socket lifecycle around a [`ReconciliationLoop`]
///
/// Connects, reconciles until the connection is lost, closes the socket,
/// backs off and tries again, until the host asks to exit. Reconciliation
/// state survives reconnects; only a sync from the mod resets it.
pub struct ClientSession<H> {
    config: ClientConfig,
    host: H,
    reconciler: ReconciliationLoop<H>,
    backoff: ReconnectBackoff,
}

impl<H: HostSession + Clone> ClientSession<H> {
    pub fn new(config: ClientConfig, host: H, catalog: Arc<Catalog>) -> Self {
        Self {
            backoff: ReconnectBackoff::new(&config.backoff),
            reconciler: ReconciliationLoop::new(config.clone(), host.clone(), catalog),
            config,
            host,
        }
    }

    pub fn reconciler(&self) -> &ReconciliationLoop<H> {
        &self.reconciler
    }

    /// Run until the host signals exit. Never fails.
    pub async fn run(mut self) {
        let mut exit = self.host.subscribe_exit();

        while !self.host.exit_requested() {
            if !self.host.is_slot_connected() {
                sleep_or_exit(self.config.no_slot_retry_delay(), &mut exit).await;
                continue;
            }

            match TunerTransport::connect(
                self.config.tuner_addr,
                self.config.settle_delay(),
                self.config.read_timeout(),
            )
            .await
            {
                Ok(mut transport) => {
                    tracing::debug!(addr = %transport.remote_addr(), "tuner socket connected");
                    let result = self.reconciler.run(&mut transport).await;
                    transport.shutdown().await;
                    if result.is_ok() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "tuner connect failed");
                    self.reconciler.mark_unreachable();
                }
            }

            if self.reconciler.take_game_contact() {
                self.backoff.reset();
            }
            let delay = self.backoff.next_delay();
            tracing::debug!(?delay, attempt = self.backoff.attempts(), "reconnecting to game");
            sleep_or_exit(delay, &mut exit).await;
        }

        tracing::debug!("client stopped");
    }
}
