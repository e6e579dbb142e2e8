//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary protocol for the data plane:
//! - fixed-size frame encoding with a 2-byte compressed-length field
//! - packet-list encoding/decoding with validated length fields
//! - frame buffer for accumulating partial reads

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_raw_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    decode_frame_header, decode_packet_list, encode_frame_into, frame_size, max_packet_len,
    payload_budget, PacketListIter, FRAME_HEADER_SIZE, FRAME_HEADROOM, LIST_HEADER_SIZE,
    PACKET_HEADER_SIZE,
};
