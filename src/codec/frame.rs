use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Prefix of every scripted command body
pub const COMMAND_PREFIX: &[u8] = b"CMD:0:";

/// Message tag for command frames (second header word)
pub const COMMAND_TAG: u32 = 3;

/// Header: u32 LE body length + u32 LE message tag
pub const HEADER_LEN: usize = 8;

/// The game reads the body length from a single byte
pub const MAX_BODY_LEN: usize = 255;

/// Longest call text that still fits in one frame
pub const MAX_COMMAND_LEN: usize = MAX_BODY_LEN - COMMAND_PREFIX.len() - 1;

/// "Attach to this socket" control frame
pub const ATTACH_FRAME: &[u8] = b"\x05\x00\x00\x00\x04\x00\x00\x00APP:\x00";

/// "Drop other listeners" control frame
pub const DROP_LISTENERS_FRAME: &[u8] = b"\x05\x00\x00\x00\x00\x00\x00\x00LSQ:\x00";

/// Encode call text into a command frame
///
/// Layout: `<len u32 LE><tag u32 LE>CMD:0:<command>\0`, where `len` counts
/// the body from `CMD:0:` through the trailing NUL.
pub fn encode(command: &str) -> Result<Bytes> {
    let body_len = COMMAND_PREFIX.len() + command.len() + 1;
    if body_len > MAX_BODY_LEN {
        return Err(Error::CommandTooLong { len: body_len, max: MAX_BODY_LEN });
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    buf.put_u32_le(body_len as u32);
    buf.put_u32_le(COMMAND_TAG);
    buf.put_slice(COMMAND_PREFIX);
    buf.put_slice(command.as_bytes());
    buf.put_u8(0);
    Ok(buf.freeze())
}

/// The readiness handshake, in send order
pub fn handshake_frames() -> [Bytes; 2] {
    [Bytes::from_static(ATTACH_FRAME), Bytes::from_static(DROP_LISTENERS_FRAME)]
}
