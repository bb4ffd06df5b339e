//! Source RCON packet codec and incremental framer.
//!
//! Every packet on the wire is:
//!
//!   `<i32 size><i32 request id><i32 type><body bytes>\0\0`
//!
//! with all integers little-endian and `size` counting the bytes that follow
//! it. The framer below is fed raw socket reads and yields whole packets.
//! Unlike a serial link there is no resynchronization: a malformed length on
//! a TCP stream means the peer is not speaking RCON, so it is reported as a
//! protocol error.
use bytes::{Buf, BufMut, BytesMut};

use super::RconError;

/// Wire values for the packet `type` field.
pub mod packet_type {
    /// Server → client command output.
    pub const RESPONSE_VALUE: i32 = 0;
    /// Server → client authentication verdict. Shares its value with EXEC_COMMAND.
    pub const AUTH_RESPONSE: i32 = 2;
    /// Client → server command.
    pub const EXEC_COMMAND: i32 = 2;
    /// Client → server login with the RCON password.
    pub const AUTH: i32 = 3;
}

/// Request id the server puts in the auth response when the password is wrong.
pub const AUTH_FAILED_ID: i32 = -1;

/// Smallest legal `size`: id + type + two terminators.
pub const MIN_PACKET_SIZE: usize = 10;

/// Upper bound on an incoming `size` field.
pub const MAX_PACKET_SIZE: usize = 64 * 1024;

/// Largest body a Minecraft server puts in one response packet before
/// continuing in the next one.
pub const MAX_FRAGMENT_BODY: usize = 4096;

/// Packet kinds a client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Auth,
    ExecCommand,
}

impl PacketKind {
    pub fn as_i32(self) -> i32 {
        match self {
            PacketKind::Auth => packet_type::AUTH,
            PacketKind::ExecCommand => packet_type::EXEC_COMMAND,
        }
    }
}

/// A single RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl RconPacket {
    pub fn new(id: i32, kind: PacketKind, body: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.as_i32(),
            body: body.into(),
        }
    }

    /// Serialize including the size prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RconError> {
        let body = self.body.as_bytes();
        if body.contains(&0) {
            return Err(RconError::Protocol(
                "command text cannot contain NUL bytes".to_string(),
            ));
        }
        let size = 4 + 4 + body.len() + 2;
        if size > MAX_PACKET_SIZE {
            return Err(RconError::Protocol(format!(
                "outgoing packet too large: {} bytes",
                size
            )));
        }

        let mut buf = BytesMut::with_capacity(4 + size);
        buf.put_i32_le(size as i32);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.kind);
        buf.put_slice(body);
        buf.put_u8(0);
        buf.put_u8(0);
        Ok(buf.to_vec())
    }

    /// Parse a packet from its payload (the bytes after the size prefix).
    pub fn decode(payload: &[u8]) -> Result<Self, RconError> {
        if payload.len() < MIN_PACKET_SIZE {
            return Err(RconError::Protocol(format!(
                "packet too short: {} bytes",
                payload.len()
            )));
        }
        let mut head = &payload[..8];
        let id = head.get_i32_le();
        let kind = head.get_i32_le();

        let (body, padding) = payload[8..].split_at(payload.len() - 10);
        if padding != [0, 0] {
            return Err(RconError::Protocol("incorrect packet padding".to_string()));
        }
        // Some servers NUL-terminate the body before the padding; keep text up to the first NUL.
        let end = body.iter().position(|&b| b == 0).unwrap_or(body.len());
        let body = String::from_utf8_lossy(&body[..end]).into_owned();

        Ok(Self { id, kind, body })
    }
}

/// Incremental framer over a byte buffer filled from the socket.
pub struct RconFramer {
    buf: BytesMut,
}

impl Default for RconFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl RconFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    #[cfg(test)]
    fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Buffer to read socket data into.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Bytes received but not yet consumed as a packet.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Extract the next complete packet. `Ok(None)` means more bytes are needed.
    pub fn next_packet(&mut self) -> Result<Option<RconPacket>, RconError> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        let size = i32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if size < MIN_PACKET_SIZE as i32 || size as usize > MAX_PACKET_SIZE {
            return Err(RconError::Protocol(format!("invalid packet size {}", size)));
        }
        let size = size as usize;
        if self.buf.len() < 4 + size {
            return Ok(None);
        }
        self.buf.advance(4);
        let payload = self.buf.split_to(size);
        RconPacket::decode(&payload).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_packet_layout() {
        let bytes = RconPacket::new(7, PacketKind::Auth, "password123")
            .to_bytes()
            .unwrap();
        // 4 (size) + 4 (id) + 4 (type) + 11 (body) + 2 (terminators)
        assert_eq!(bytes.len(), 25);
        assert_eq!(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 21);
        assert_eq!(i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 7);
        assert_eq!(i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 3);
        assert_eq!(&bytes[12..23], b"password123");
        assert_eq!(&bytes[23..], &[0, 0]);
    }

    #[test]
    fn rejects_nul_in_command() {
        let err = RconPacket::new(1, PacketKind::ExecCommand, "say\0hi")
            .to_bytes()
            .unwrap_err();
        assert!(matches!(err, RconError::Protocol(_)));
    }

    #[test]
    fn decode_rejects_bad_padding() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1i32.to_le_bytes());
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend_from_slice(b"ok");
        payload.extend_from_slice(&[b'x', 0]);
        assert!(matches!(
            RconPacket::decode(&payload),
            Err(RconError::Protocol(_))
        ));
    }

    #[test]
    fn framer_handles_split_and_coalesced_packets() {
        let a = RconPacket::new(1, PacketKind::ExecCommand, "list").to_bytes().unwrap();
        let b = RconPacket::new(2, PacketKind::ExecCommand, "time query daytime")
            .to_bytes()
            .unwrap();
        let mut framer = RconFramer::new();
        framer.push(&a[..5]);
        assert!(framer.next_packet().unwrap().is_none());
        framer.push(&a[5..]);
        framer.push(&b);
        let first = framer.next_packet().unwrap().unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.body, "list");
        let second = framer.next_packet().unwrap().unwrap();
        assert_eq!(second.body, "time query daytime");
        assert!(framer.next_packet().unwrap().is_none());
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn framer_rejects_oversize_length() {
        let mut framer = RconFramer::new();
        framer.push(&(1_000_000i32).to_le_bytes());
        assert!(framer.next_packet().is_err());
        let mut framer = RconFramer::new();
        framer.push(&(3i32).to_le_bytes());
        assert!(framer.next_packet().is_err());
    }
}
