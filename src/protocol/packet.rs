//! RCON packet definitions

use super::PACKET_OVERHEAD;

/// RCON packet types.
///
/// `ExecCommand` and `AuthResponse` share wire code 2; which one a code
/// means depends on direction. The client only ever receives
/// `AuthResponse` and `ResponseValue`, so received code 2 decodes as
/// `AuthResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// SERVERDATA_AUTH - authentication request carrying the password
    Auth,
    /// SERVERDATA_EXECCOMMAND - command execution request
    ExecCommand,
    /// SERVERDATA_AUTH_RESPONSE - authentication verdict from the server
    AuthResponse,
    /// SERVERDATA_RESPONSE_VALUE - command output, possibly split
    ResponseValue,
}

impl PacketType {
    /// Wire code used when encoding this type
    pub fn code(self) -> i32 {
        match self {
            PacketType::Auth => 3,
            PacketType::ExecCommand | PacketType::AuthResponse => 2,
            PacketType::ResponseValue => 0,
        }
    }

    /// Decode a received type code, from the client's point of view
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            3 => Some(PacketType::Auth),
            2 => Some(PacketType::AuthResponse),
            0 => Some(PacketType::ResponseValue),
            _ => None,
        }
    }
}

/// A single RCON protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Caller-chosen correlation integer
    pub request_id: i32,
    /// One of the SERVERDATA_* types
    pub packet_type: PacketType,
    /// Body content, without the terminating NULs
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(request_id: i32, packet_type: PacketType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            request_id,
            packet_type,
            body: body.into(),
        }
    }

    /// Declared size of this packet on the wire, excluding the size field
    pub fn wire_size(&self) -> i32 {
        (self.body.len() + PACKET_OVERHEAD) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_match_the_wire_protocol() {
        assert_eq!(PacketType::Auth.code(), 3);
        assert_eq!(PacketType::ExecCommand.code(), 2);
        assert_eq!(PacketType::AuthResponse.code(), 2);
        assert_eq!(PacketType::ResponseValue.code(), 0);
    }

    #[test]
    fn received_code_2_is_an_auth_response() {
        assert_eq!(PacketType::from_code(2), Some(PacketType::AuthResponse));
        assert_eq!(PacketType::from_code(7), None);
    }

    #[test]
    fn wire_size_counts_id_type_body_and_terminators() {
        let packet = Packet::new(1, PacketType::ExecCommand, "status");
        assert_eq!(packet.wire_size(), 4 + 4 + 6 + 2);
    }
}
