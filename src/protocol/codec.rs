//! Codec for encoding/decoding RCON frames
//!
//! Pure byte-shuffling: nothing here performs I/O or blocks. The client's
//! read path feeds stream bytes into a [`PacketDecoder`], which yields
//! complete frames as they become available.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{Packet, PacketType, MAX_BODY_SIZE, MAX_PACKET_SIZE, PACKET_OVERHEAD};

/// Frame-level failures
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("body too large: {0} bytes (max: {MAX_BODY_SIZE})")]
    BodyTooLarge(usize),

    #[error("{0} is an invalid packet size")]
    InvalidSize(i32),

    #[error("declared size {declared} does not match {actual} available bytes")]
    SizeMismatch { declared: i32, actual: usize },

    #[error("{0} is not a known packet type")]
    InvalidType(i32),

    #[error("packet is not terminated by two NUL bytes")]
    MissingTerminator,
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Encode a packet into `buf` in wire order
pub fn encode_packet(packet: &Packet, buf: &mut BytesMut) -> CodecResult<()> {
    if packet.body.len() > MAX_BODY_SIZE {
        return Err(CodecError::BodyTooLarge(packet.body.len()));
    }

    buf.put_i32_le(packet.wire_size());
    buf.put_i32_le(packet.request_id);
    buf.put_i32_le(packet.packet_type.code());
    buf.put_slice(&packet.body);
    buf.put_slice(&[0, 0]);
    Ok(())
}

/// Decode exactly one frame from `bytes`, which must contain the whole
/// packet including the size prefix and nothing else
pub fn decode_packet(bytes: &[u8]) -> CodecResult<Packet> {
    if bytes.len() < 4 {
        return Err(CodecError::SizeMismatch {
            declared: 0,
            actual: bytes.len(),
        });
    }

    let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if declared < PACKET_OVERHEAD as i32 {
        return Err(CodecError::InvalidSize(declared));
    }
    if declared as usize != bytes.len() - 4 {
        return Err(CodecError::SizeMismatch {
            declared,
            actual: bytes.len() - 4,
        });
    }

    decode_frame(&bytes[4..])
}

/// Decode the remainder of a packet after the size field has been consumed.
/// The caller guarantees `frame.len()` equals the declared size.
fn decode_frame(frame: &[u8]) -> CodecResult<Packet> {
    let request_id = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let code = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
    let packet_type = PacketType::from_code(code).ok_or(CodecError::InvalidType(code))?;

    if frame[frame.len() - 2..] != [0, 0] {
        return Err(CodecError::MissingTerminator);
    }

    Ok(Packet {
        request_id,
        packet_type,
        body: frame[8..frame.len() - 2].to_vec(),
    })
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Size,
    Frame {
        declared: usize,
    },
}

/// Streaming decoder over a byte stream
///
/// Accumulated stream bytes go into a `BytesMut`; `decode` consumes them
/// and returns `Ok(None)` until a complete frame is buffered.
#[derive(Default)]
pub struct PacketDecoder {
    state: DecodeState,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Size,
        }
    }

    /// Attempt to decode a frame from the buffer
    pub fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Packet>> {
        loop {
            match self.state {
                DecodeState::Size => {
                    if buf.len() < 4 {
                        return Ok(None);
                    }

                    let declared = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                    if declared < PACKET_OVERHEAD as i32 {
                        return Err(CodecError::InvalidSize(declared));
                    }
                    if declared > MAX_PACKET_SIZE {
                        tracing::warn!(
                            "Packet size {} exceeds the protocol maximum of {}",
                            declared,
                            MAX_PACKET_SIZE
                        );
                    }

                    buf.advance(4);
                    self.state = DecodeState::Frame {
                        declared: declared as usize,
                    };
                }
                DecodeState::Frame { declared } => {
                    if buf.len() < declared {
                        return Ok(None);
                    }

                    let frame = buf.split_to(declared);
                    self.state = DecodeState::Size;
                    return decode_frame(&frame).map(Some);
                }
            }
        }
    }
}
