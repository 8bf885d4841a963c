/// Where the client is on the way to a usable game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    ProbingGame,
    GameReady,
    ProbingMod,
    ModReady,
}

impl ConnectionState {
    pub fn game_ready(self) -> bool {
        matches!(self, Self::GameReady | Self::ProbingMod | Self::ModReady)
    }

    pub fn mod_ready(self) -> bool {
        self == Self::ModReady
    }
}

/// Owns the [`ConnectionState`] and logs readiness changes
///
/// Readiness transitions are the only thing reported to the user, so each
/// message is logged once per change rather than once per probe.
#[derive(Debug, Default)]
pub struct Readiness {
    state: ConnectionState,
    game_seen: Option<bool>,
    mod_seen: Option<bool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn begin_game_probe(&mut self) {
        self.state = ConnectionState::ProbingGame;
    }

    pub fn begin_mod_probe(&mut self) {
        self.state = ConnectionState::ProbingMod;
    }

    pub fn game_probed(&mut self, ready: bool) {
        if self.game_seen != Some(ready) {
            if ready {
                tracing::info!("Civ V is running");
            } else {
                tracing::info!("Waiting for Civ V to start...");
            }
            self.game_seen = Some(ready);
        }
        if !ready {
            self.mod_seen = None;
        }
        self.state = if ready { ConnectionState::GameReady } else { ConnectionState::ProbingGame };
    }

    pub fn mod_probed(&mut self, ready: bool) {
        if self.mod_seen != Some(ready) {
            if ready {
                tracing::info!("Civ V AP Mod is connected and ready");
            } else {
                tracing::info!("Waiting for Civ V AP Mod to be ready...");
            }
            self.mod_seen = Some(ready);
        }
        self.state = if ready { ConnectionState::ModReady } else { ConnectionState::GameReady };
    }

    /// Socket lost; start over from the top
    pub fn disconnected(&mut self) {
        if self.game_seen == Some(true) {
            tracing::info!("Lost connection to Civ V");
        }
        self.game_seen = None;
        self.mod_seen = None;
        self.state = ConnectionState::Disconnected;
    }
}
