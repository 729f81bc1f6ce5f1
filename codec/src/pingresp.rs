// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::header::{FixedHeader, Packet, PacketType};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// The broker's reply to PINGREQ. Carries no variable header or payload.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PingResponsePacket;

impl Packet for PingResponsePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PingResponse
    }
}

impl DecodePacket for PingResponsePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::PingResponse {
            Err(DecodeError::InvalidPacketType)
        } else if fixed_header.remaining_length() != 0 {
            Err(DecodeError::InvalidRemainingLength)
        } else {
            Ok(Self)
        }
    }
}

impl EncodePacket for PingResponsePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        FixedHeader::new(PacketType::PingResponse, 0)?.encode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut buf = Vec::new();
        PingResponsePacket.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0xd0, 0x00]);
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PingResponsePacket::decode(&mut ba).unwrap(),
            PingResponsePacket
        );
    }
}
