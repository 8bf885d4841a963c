//! Two-stage readiness check
//!
//! The game can be up and listening long before the mod script is loaded
//! (or it may never load for this save), so the two stages are polled
//! independently.

use crate::codec::handshake_frames;
use crate::error::{Error, Result};
use crate::protocol::commands::ModCommand;
use crate::protocol::transport::GameLink;

/// Buffer sizes for the probes
///
/// Both are large so a probe also drains stale data left in the socket by a
/// previous attach.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessProbe {
    pub game_response_size: usize,
    pub mod_response_size: usize,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            game_response_size: 20 * 1024,
            mod_response_size: 100 * 1024,
        }
    }
}

impl ReadinessProbe {
    /// Is the game listening on the Tuner port?
    ///
    /// Sends the attach and drop-listeners frames, which also reclaims the
    /// port from any other listener. Safe to repeat every tick. Only a
    /// timeout means "not ready"; connection loss propagates.
    pub async fn probe_game<L: GameLink>(&self, link: &mut L) -> Result<bool> {
        match link.send_frames(&handshake_frames(), self.game_response_size).await {
            Ok(_) => Ok(true),
            Err(Error::Timeout) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Is the mod loaded in the current game?
    ///
    /// A missing script (runtime error) or a timeout both mean "not yet".
    pub async fn probe_mod<L: GameLink>(&self, link: &mut L) -> Result<bool> {
        match link.send_mod_command(&ModCommand::IsModReady, self.mod_response_size).await {
            Ok(payload) => Ok(payload.get("ready").and_then(|v| v.as_bool()).unwrap_or(false)),
            Err(Error::Timeout) | Err(Error::ScriptRuntime(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockGame;
    use serde_json::json;

    #[tokio::test]
    async fn test_probe_game() {
        let probe = ReadinessProbe::default();
        let mut game = MockGame::new();
        assert!(probe.probe_game(&mut game).await.unwrap());
        assert_eq!(game.handshakes, 1);
        assert_eq!(game.last_response_size, 20 * 1024);

        game.game_listening = false;
        assert!(!probe.probe_game(&mut game).await.unwrap());

        game.connection_lost = true;
        assert!(probe.probe_game(&mut game).await.unwrap_err().is_connection_lost());
    }

    #[tokio::test]
    async fn test_probe_mod() {
        let probe = ReadinessProbe::default();
        let mut game = MockGame::new();

        // Mod script not loaded
        game.mod_loaded = false;
        assert!(!probe.probe_mod(&mut game).await.unwrap());

        game.mod_loaded = true;
        game.ready_payload = json!({"ready": true});
        assert!(probe.probe_mod(&mut game).await.unwrap());
        assert_eq!(game.last_response_size, 100 * 1024);

        game.ready_payload = json!({});
        assert!(!probe.probe_mod(&mut game).await.unwrap());
    }
}
