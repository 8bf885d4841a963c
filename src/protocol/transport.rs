use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec::{encode, parse_response};
use crate::error::{Error, Result};
use crate::protocol::commands::ModCommand;

/// Request/response channel to the game's scripting port
pub trait GameLink: Send {
    /// Send `frames` in order, then read and parse one response of up to `response_size` bytes
    fn send_frames(
        &mut self,
        frames: &[Bytes],
        response_size: usize,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Send one namespaced mod call
    fn send_mod_command(
        &mut self,
        command: &ModCommand,
        response_size: usize,
    ) -> impl Future<Output = Result<Value>> + Send {
        async move {
            let frame = encode(&command.qualified())?;
            tracing::debug!(command = %command.call_text(), "sending mod command");
            self.send_frames(&[frame], response_size).await
        }
    }
}

/// TCP transport to the Tuner port
///
/// Owns the socket for its whole lifetime. One exchange at a time: write
/// every frame, wait out the settle delay, then do a single bounded read.
pub struct TunerTransport {
    stream: TcpStream,
    remote_addr: SocketAddr,
    settle_delay: Duration,
    read_timeout: Duration,
}

impl TunerTransport {
    pub async fn connect(remote_addr: SocketAddr, settle_delay: Duration, read_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(remote_addr).await.map_err(|e| Error::Connection {
            reason: format!("{}: {}", remote_addr, e),
        })?;
        stream.set_nodelay(true).map_err(Error::from_socket)?;

        Ok(Self {
            stream,
            remote_addr,
            settle_delay,
            read_timeout,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Close the socket
    pub async fn shutdown(mut self) {
        let _ = self.stream.shutdown().await;
    }

    async fn exchange(&mut self, frames: &[Bytes], response_size: usize) -> Result<Value> {
        for frame in frames {
            self.stream.write_all(frame).await.map_err(Error::from_socket)?;
        }

        // The scripting bridge has no per-command readiness signal
        tokio::time::sleep(self.settle_delay).await;

        let mut buf = vec![0u8; response_size.max(1)];
        let len = match tokio::time::timeout(self.read_timeout, self.stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                return Err(Error::Connection {
                    reason: "closed by game".into(),
                })
            }
            Ok(Ok(len)) => len,
            Ok(Err(e)) => return Err(Error::from_socket(e)),
            Err(_) => return Err(Error::Timeout),
        };
        buf.truncate(len);

        parse_response(&buf)
    }
}

impl GameLink for TunerTransport {
    fn send_frames(
        &mut self,
        frames: &[Bytes],
        response_size: usize,
    ) -> impl Future<Output = Result<Value>> + Send {
        async move {
            tracing::debug!(frames = frames.len(), response_size, "sending frames");
            match self.exchange(frames, response_size).await {
                Ok(payload) => {
                    tracing::debug!(%payload, "received payload");
                    Ok(payload)
                }
                Err(Error::Timeout) => {
                    tracing::debug!("timeout while receiving data");
                    Err(Error::Timeout)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "error while receiving data");
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MAX_COMMAND_LEN;
    use serde_json::json;
    use tokio::net::TcpListener;

    const SETTLE: Duration = Duration::from_millis(10);
    const READ_TIMEOUT: Duration = Duration::from_millis(300);

    /// Reads one frame (header + body) and returns the call text
    async fn read_command(stream: &mut TcpStream) -> String {
        let mut header = [0u8; 8];
        stream.read_exact(&mut header).await.unwrap();
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
        String::from_utf8(body[6..len - 1].to_vec()).unwrap()
    }

    async fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    /// Game stub that answers each of `count` commands with its call text
    fn spawn_echo_game(listener: TcpListener, count: usize) -> tokio::task::JoinHandle<TcpStream> {
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            for _ in 0..count {
                let command = read_command(&mut stream).await;
                let mut reply = vec![0x20, 0, 0, 0, 1, 0, 0, 0];
                reply.extend_from_slice(format!("O:APSTART:{{\"echo\":\"{}\"}}:APEND\0", command).as_bytes());
                stream.write_all(&reply).await.unwrap();
            }
            stream
        })
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let (listener, addr) = listener().await;
        let game = spawn_echo_game(listener, 1);

        let mut transport = TunerTransport::connect(addr, SETTLE, READ_TIMEOUT).await.unwrap();
        let payload = transport.send_mod_command(&ModCommand::GetPushTable, 4096).await.unwrap();
        assert_eq!(payload, json!({"echo": "GameCore.Game.AP.GetPushTable()"}));
        drop(game.await.unwrap());
    }

    #[tokio::test]
    async fn test_round_trip_across_lengths() {
        let lengths = [0, 1, 2, 64, 200, MAX_COMMAND_LEN - 1, MAX_COMMAND_LEN];
        let grants: Vec<ModCommand> = (1..)
            .map(|n| ModCommand::GrantTechs((1..=n).map(|id| id * 1000).collect()))
            .take_while(ModCommand::fits_frame)
            .collect();
        assert!(grants.len() > 20);
        assert!(encode(&"x".repeat(MAX_COMMAND_LEN + 1)).is_err());

        let (listener, addr) = listener().await;
        let game = spawn_echo_game(listener, lengths.len() + grants.len());
        let mut transport = TunerTransport::connect(addr, SETTLE, READ_TIMEOUT).await.unwrap();

        for len in lengths {
            let text = "x".repeat(len);
            let payload = transport.send_frames(&[encode(&text).unwrap()], 4096).await.unwrap();
            assert_eq!(payload, json!({"echo": text}), "length {}", len);
        }
        for command in &grants {
            let payload = transport.send_mod_command(command, 4096).await.unwrap();
            assert_eq!(payload, json!({"echo": command.qualified()}));
        }
        drop(game.await.unwrap());
    }

    #[tokio::test]
    async fn test_silent_game_times_out() {
        let (listener, addr) = listener().await;
        let game = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_command(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut transport = TunerTransport::connect(addr, SETTLE, READ_TIMEOUT).await.unwrap();
        let err = transport.send_mod_command(&ModCommand::IsModReady, 1024).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        game.abort();
    }

    #[tokio::test]
    async fn test_closed_socket_is_connection_loss() {
        let (listener, addr) = listener().await;
        let game = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut transport = TunerTransport::connect(addr, SETTLE, READ_TIMEOUT).await.unwrap();
        game.await.unwrap();
        let err = transport.send_mod_command(&ModCommand::IsModReady, 1024).await.unwrap_err();
        assert!(err.is_connection_lost());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (listener, addr) = listener().await;
        drop(listener);
        let err = TunerTransport::connect(addr, SETTLE, READ_TIMEOUT).await.err().unwrap();
        assert!(err.is_connection_lost());
    }

    #[tokio::test]
    async fn test_runtime_error_reply() {
        let (listener, addr) = listener().await;
        let game = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_command(&mut stream).await;
            stream.write_all(b"ERR:Runtime Error: attempt to call nil\0").await.unwrap();
            stream
        });

        let mut transport = TunerTransport::connect(addr, SETTLE, READ_TIMEOUT).await.unwrap();
        let err = transport.send_mod_command(&ModCommand::IsModReady, 1024).await.unwrap_err();
        assert!(matches!(err, Error::ScriptRuntime(_)));
        drop(game.await.unwrap());
    }
}
