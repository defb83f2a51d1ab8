//! Wire format for the simulated protocol
//!
//! Every datagram starts with a big-endian u16 kind code; the code alone
//! determines the rest of the layout. Control messages are the bare code;
//! data messages carry a sequence number, a protocol version, and either a
//! length-prefixed payload (requests) or a fixed 8-byte server timestamp
//! (responses).

use crate::error::{Result, SimError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Wire kind codes.
pub mod kind {
    pub const SYN: u16 = 1;
    pub const SYN_ACK: u16 = 2;
    pub const ACK: u16 = 3;
    // 4 is reserved on the wire; the numbering gap must stay.
    pub const DATA_REQUEST: u16 = 5;
    pub const DATA_RESPONSE: u16 = 6;
    pub const FIN: u16 = 7;
    pub const FIN_ACK: u16 = 8;
    pub const FIN_ACK2: u16 = 9;
}

/// Length of the timestamp field on a data response
pub const TIMESTAMP_LEN: usize = 8;

/// A single protocol message, one variant per wire kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Syn,
    SynAck,
    Ack,
    DataRequest {
        seq: u16,
        version: u8,
        payload: Bytes,
    },
    DataResponse {
        seq: u16,
        version: u8,
        timestamp: [u8; TIMESTAMP_LEN],
    },
    Fin,
    FinAck,
    FinAck2,
}

impl Message {
    /// Wire code for this message's kind
    pub fn kind_code(&self) -> u16 {
        match self {
            Message::Syn => kind::SYN,
            Message::SynAck => kind::SYN_ACK,
            Message::Ack => kind::ACK,
            Message::DataRequest { .. } => kind::DATA_REQUEST,
            Message::DataResponse { .. } => kind::DATA_RESPONSE,
            Message::Fin => kind::FIN,
            Message::FinAck => kind::FIN_ACK,
            Message::FinAck2 => kind::FIN_ACK2,
        }
    }

    /// Kind name for logging
    pub fn kind_str(&self) -> &'static str {
        match self {
            Message::Syn => "SYN",
            Message::SynAck => "SYN_ACK",
            Message::Ack => "ACK",
            Message::DataRequest { .. } => "DATA_REQUEST",
            Message::DataResponse { .. } => "DATA_RESPONSE",
            Message::Fin => "FIN",
            Message::FinAck => "FIN_ACK",
            Message::FinAck2 => "FIN_ACK2",
        }
    }

    /// Encode into a wire datagram (network byte order)
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16);
        buf.put_u16(self.kind_code());

        match self {
            Message::DataRequest {
                seq,
                version,
                payload,
            } => {
                buf.put_u16(*seq);
                buf.put_u8(*version);
                buf.put_u32(payload.len() as u32);
                buf.extend_from_slice(payload);
            }
            Message::DataResponse {
                seq,
                version,
                timestamp,
            } => {
                buf.put_u16(*seq);
                buf.put_u8(*version);
                buf.put_slice(timestamp);
            }
            _ => {}
        }

        buf.freeze()
    }

    /// Decode a wire datagram.
    ///
    /// Fails with [`SimError::Malformed`] when the byte length is
    /// inconsistent with the layout the leading kind code implies, or when
    /// the code is unknown (including the reserved code 4).
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        if buf.len() < 2 {
            return Err(SimError::malformed("datagram shorter than kind code"));
        }

        let code = buf.get_u16();
        match code {
            kind::SYN | kind::SYN_ACK | kind::ACK | kind::FIN | kind::FIN_ACK | kind::FIN_ACK2 => {
                if buf.has_remaining() {
                    return Err(SimError::malformed(format!(
                        "control message {} with {} trailing bytes",
                        code,
                        buf.remaining()
                    )));
                }
                Ok(match code {
                    kind::SYN => Message::Syn,
                    kind::SYN_ACK => Message::SynAck,
                    kind::ACK => Message::Ack,
                    kind::FIN => Message::Fin,
                    kind::FIN_ACK => Message::FinAck,
                    _ => Message::FinAck2,
                })
            }
            kind::DATA_REQUEST => {
                if buf.remaining() < 7 {
                    return Err(SimError::malformed("truncated data request header"));
                }
                let seq = buf.get_u16();
                let version = buf.get_u8();
                let len = buf.get_u32() as usize;
                if buf.remaining() != len {
                    return Err(SimError::malformed(format!(
                        "data request declares {} payload bytes, {} present",
                        len,
                        buf.remaining()
                    )));
                }
                Ok(Message::DataRequest {
                    seq,
                    version,
                    payload: buf,
                })
            }
            kind::DATA_RESPONSE => {
                if buf.remaining() != 3 + TIMESTAMP_LEN {
                    return Err(SimError::malformed(format!(
                        "data response must be {} bytes after the kind, got {}",
                        3 + TIMESTAMP_LEN,
                        buf.remaining()
                    )));
                }
                let seq = buf.get_u16();
                let version = buf.get_u8();
                let mut timestamp = [0u8; TIMESTAMP_LEN];
                buf.copy_to_slice(&mut timestamp);
                Ok(Message::DataResponse {
                    seq,
                    version,
                    timestamp,
                })
            }
            other => Err(SimError::malformed(format!("unknown kind code {other}"))),
        }
    }
}

/// Render a response timestamp field for display
pub fn timestamp_str(timestamp: &[u8; TIMESTAMP_LEN]) -> String {
    String::from_utf8_lossy(timestamp).trim().to_string()
}
