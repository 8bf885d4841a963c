//! Scripted in-process game for tests

use std::collections::VecDeque;
use std::future::Future;

use bytes::Bytes;
use serde_json::{json, Value};

use crate::codec::ATTACH_FRAME;
use crate::error::{Error, Result};
use crate::protocol::commands::MOD_NAMESPACE;
use crate::protocol::transport::GameLink;

pub struct MockGame {
    pub game_listening: bool,
    pub mod_loaded: bool,
    pub connection_lost: bool,
    pub ready_payload: Value,
    /// Served by successive `GetPushTable()` calls; `{}` once exhausted
    pub push_tables: VecDeque<Value>,
    /// Call text of every mod call the game accepted, in order
    pub commands: Vec<String>,
    /// Next call starting with this text fails once with a protocol error
    pub fail_once: Option<String>,
    pub handshakes: usize,
    pub last_response_size: usize,
}

impl MockGame {
    pub fn new() -> Self {
        Self {
            game_listening: true,
            mod_loaded: true,
            connection_lost: false,
            ready_payload: json!({"ready": true}),
            push_tables: VecDeque::new(),
            commands: Vec::new(),
            fail_once: None,
            handshakes: 0,
            last_response_size: 0,
        }
    }

    /// Accepted calls other than the readiness and push table polls
    pub fn grants(&self) -> Vec<&str> {
        self.commands
            .iter()
            .map(String::as_str)
            .filter(|c| *c != "IsModReady()" && *c != "GetPushTable()")
            .collect()
    }

    fn call_text(frame: &[u8]) -> String {
        let body = &frame[8 + 6..frame.len() - 1];
        let text = String::from_utf8_lossy(body);
        text.strip_prefix(MOD_NAMESPACE).unwrap_or(&text).to_string()
    }

    fn respond(&mut self, frames: &[Bytes], response_size: usize) -> Result<Value> {
        self.last_response_size = response_size;
        if self.connection_lost {
            return Err(Error::Connection { reason: "reset by peer".into() });
        }
        if !self.game_listening {
            return Err(Error::Timeout);
        }
        if frames.first().map(|f| f.as_ref()) == Some(ATTACH_FRAME) {
            self.handshakes += 1;
            return Ok(json!({}));
        }
        if !self.mod_loaded {
            return Err(Error::ScriptRuntime("ERR:Runtime Error: attempt to index nil".into()));
        }

        let call = Self::call_text(&frames[0]);
        if let Some(prefix) = &self.fail_once {
            if call.starts_with(prefix.as_str()) {
                self.fail_once = None;
                return Err(Error::Protocol(format!("ERR:{}", call)));
            }
        }

        let reply = match call.as_str() {
            "IsModReady()" => self.ready_payload.clone(),
            "GetPushTable()" => self.push_tables.pop_front().unwrap_or_else(|| json!({})),
            _ => json!({}),
        };
        self.commands.push(call);
        Ok(reply)
    }
}

impl GameLink for MockGame {
    fn send_frames(
        &mut self,
        frames: &[Bytes],
        response_size: usize,
    ) -> impl Future<Output = Result<Value>> + Send {
        let result = self.respond(frames, response_size);
        async move { result }
    }
}
