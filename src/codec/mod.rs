pub mod frame;
pub mod response;

pub use frame::{
    encode, handshake_frames,
    ATTACH_FRAME, DROP_LISTENERS_FRAME, MAX_BODY_LEN, MAX_COMMAND_LEN,
};
pub use response::{decode, extract_payload, parse_response};
