// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::PacketId;
use crate::header::{FixedHeader, Packet, PacketType};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, QoS};

/// Per-filter result in a SUBACK packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscribeAck {
    /// Maximum QoS granted for this filter, which may be lower than requested.
    QoS(QoS),
    /// The subscription was refused (malformed filter or not authorized).
    Failure,
}

impl From<SubscribeAck> for u8 {
    fn from(ack: SubscribeAck) -> Self {
        match ack {
            SubscribeAck::QoS(qos) => qos.into(),
            SubscribeAck::Failure => 0x80,
        }
    }
}

impl TryFrom<u8> for SubscribeAck {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if v == 0x80 {
            Ok(Self::Failure)
        } else {
            Ok(Self::QoS(QoS::try_from(v)?))
        }
    }
}

/// The broker's response to a SUBSCRIBE, one result per requested filter, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeAckPacket {
    pub packet_id: PacketId,
    pub results: Vec<SubscribeAck>,
}

impl SubscribeAckPacket {
    #[must_use]
    pub const fn new(packet_id: PacketId, results: Vec<SubscribeAck>) -> Self {
        Self { packet_id, results }
    }
}

impl Packet for SubscribeAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::SubscribeAck
    }
}

impl DecodePacket for SubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::SubscribeAck {
            return Err(DecodeError::InvalidPacketType);
        }

        let packet_id = ba.read_u16()?;
        let mut results = Vec::new();
        while ba.remaining_bytes() > 0 {
            results.push(SubscribeAck::try_from(ba.read_byte()?)?);
        }

        Ok(Self { packet_id, results })
    }
}

impl EncodePacket for SubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.packet_id.to_be_bytes());
        for result in &self.results {
            payload.push((*result).into());
        }

        let fixed_header = FixedHeader::new(PacketType::SubscribeAck, payload.len())?;
        let header_len = fixed_header.encode(buf)?;
        buf.extend_from_slice(&payload);
        Ok(header_len + payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let packet = SubscribeAckPacket::new(
            5,
            vec![SubscribeAck::QoS(QoS::AtLeastOnce), SubscribeAck::Failure],
        );
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = SubscribeAckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }
}
