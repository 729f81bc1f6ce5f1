// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::header::{FixedHeader, Packet, PacketType};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// If the Server sends a CONNACK with a non-zero return code, it MUST close the
/// network connection afterward.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConnectReturnCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUsernameOrPassword = 4,
    NotAuthorized = 5,
}

impl From<ConnectReturnCode> for u8 {
    fn from(code: ConnectReturnCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::UnacceptableProtocolVersion),
            2 => Ok(Self::IdentifierRejected),
            3 => Ok(Self::ServerUnavailable),
            4 => Ok(Self::BadUsernameOrPassword),
            5 => Ok(Self::NotAuthorized),
            _ => Err(DecodeError::InvalidPacketType),
        }
    }
}

/// The first packet sent to a client in reply to CONNECT. Never carries a payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConnectAckPacket {
    /// Set only when `clean_session` was false and the broker held prior session state;
    /// this broker never persists sessions, so this is always false (see `session_present`
    /// on [`Self::new`]).
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

impl ConnectAckPacket {
    #[must_use]
    pub const fn new(session_present: bool, return_code: ConnectReturnCode) -> Self {
        Self {
            session_present,
            return_code,
        }
    }
}

impl Packet for ConnectAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::ConnectAck
    }
}

impl DecodePacket for ConnectAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::ConnectAck {
            return Err(DecodeError::InvalidPacketType);
        }
        if fixed_header.remaining_length() != 2 {
            return Err(DecodeError::InvalidRemainingLength);
        }

        let ack_flags = ba.read_byte()?;
        if ack_flags & 0b1111_1110 != 0 {
            return Err(DecodeError::InvalidPacketFlags);
        }
        let session_present = ack_flags & 0b0000_0001 != 0;
        let return_code = ConnectReturnCode::try_from(ba.read_byte()?)?;

        Ok(Self {
            session_present,
            return_code,
        })
    }
}

impl EncodePacket for ConnectAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let fixed_header = FixedHeader::new(PacketType::ConnectAck, 2)?;
        let header_len = fixed_header.encode(buf)?;
        buf.push(u8::from(self.session_present));
        buf.push(self.return_code.into());
        Ok(header_len + 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let packet = ConnectAckPacket::new(false, ConnectReturnCode::Accepted);
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0x20, 0x02, 0x00, 0x00]);

        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectAckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }
}
