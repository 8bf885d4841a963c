use civ5_catalog::CatalogError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("timeout waiting for game response")]
    Timeout,

    #[error("connection to game lost: {reason}")]
    Connection { reason: String },

    #[error("game reported an error: {0}")]
    Protocol(String),

    #[error("game script runtime error: {0}")]
    ScriptRuntime(String),

    #[error("unclassified tuner failure: {0}")]
    Unclassified(String),

    #[error("command too long: {len} bytes (max {max})")]
    CommandTooLong { len: usize, max: usize },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unknown item id: {0}")]
    UnknownItem(i64),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("host session error: {0}")]
    Host(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    /// The socket is unusable and must be replaced
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Game or mod is not in a state to answer yet; retried on the next tick
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::Timeout | Error::ScriptRuntime(_))
    }

    /// Map an OS-level socket error onto the tuner taxonomy
    pub(crate) fn from_socket(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Error::Timeout,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof => Error::Connection { reason: e.to_string() },
            _ => Error::Unclassified(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
