// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::connack::ConnectAckPacket;
use crate::connect::ConnectPacket;
use crate::disconnect::DisconnectPacket;
use crate::header::{FixedHeader, Packet as _, PacketType};
use crate::pingreq::PingRequestPacket;
use crate::pingresp::PingResponsePacket;
use crate::puback::PublishAckPacket;
use crate::pubcomp::PublishCompletePacket;
use crate::publish::PublishPacket;
use crate::pubrec::PublishReceivedPacket;
use crate::pubrel::PublishReleasePacket;
use crate::suback::SubscribeAckPacket;
use crate::subscribe::SubscribePacket;
use crate::unsuback::UnsubscribeAckPacket;
use crate::unsubscribe::UnsubscribePacket;
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// A decoded control packet of any of the 14 MQTT 3.1.1 types.
///
/// This is the unit of exchange between the frame reader, the connection actor and the
/// dispatcher: a connection decodes one of these per complete frame and the dispatcher
/// pattern-matches on it without caring which packet type produced the bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum VariablePacket {
    Connect(ConnectPacket),
    ConnectAck(ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(PublishAckPacket),
    PublishReceived(PublishReceivedPacket),
    PublishRelease(PublishReleasePacket),
    PublishComplete(PublishCompletePacket),
    Subscribe(SubscribePacket),
    SubscribeAck(SubscribeAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    PingRequest(PingRequestPacket),
    PingResponse(PingResponsePacket),
    Disconnect(DisconnectPacket),
}

impl VariablePacket {
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(p) => p.packet_type(),
            Self::ConnectAck(p) => p.packet_type(),
            Self::Publish(p) => p.packet_type(),
            Self::PublishAck(p) => p.packet_type(),
            Self::PublishReceived(p) => p.packet_type(),
            Self::PublishRelease(p) => p.packet_type(),
            Self::PublishComplete(p) => p.packet_type(),
            Self::Subscribe(p) => p.packet_type(),
            Self::SubscribeAck(p) => p.packet_type(),
            Self::Unsubscribe(p) => p.packet_type(),
            Self::UnsubscribeAck(p) => p.packet_type(),
            Self::PingRequest(p) => p.packet_type(),
            Self::PingResponse(p) => p.packet_type(),
            Self::Disconnect(p) => p.packet_type(),
        }
    }

    /// Decode one complete frame (as produced by the frame reader) into a packet.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the frame's type is unrecognized or its body is
    /// malformed.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        // Peek the packet type without disturbing the real decoder's own fixed-header read.
        let mut peek = ByteArray::new(buf);
        let fixed_header = FixedHeader::decode(&mut peek)?;

        let mut ba = ByteArray::new(buf);
        match fixed_header.packet_type() {
            PacketType::Connect => Ok(Self::Connect(ConnectPacket::decode(&mut ba)?)),
            PacketType::ConnectAck => Ok(Self::ConnectAck(ConnectAckPacket::decode(&mut ba)?)),
            PacketType::Publish { .. } => Ok(Self::Publish(PublishPacket::decode(&mut ba)?)),
            PacketType::PublishAck => Ok(Self::PublishAck(PublishAckPacket::decode(&mut ba)?)),
            PacketType::PublishReceived => {
                Ok(Self::PublishReceived(PublishReceivedPacket::decode(&mut ba)?))
            }
            PacketType::PublishRelease => {
                Ok(Self::PublishRelease(PublishReleasePacket::decode(&mut ba)?))
            }
            PacketType::PublishComplete => {
                Ok(Self::PublishComplete(PublishCompletePacket::decode(&mut ba)?))
            }
            PacketType::Subscribe => Ok(Self::Subscribe(SubscribePacket::decode(&mut ba)?)),
            PacketType::SubscribeAck => Ok(Self::SubscribeAck(SubscribeAckPacket::decode(&mut ba)?)),
            PacketType::Unsubscribe => Ok(Self::Unsubscribe(UnsubscribePacket::decode(&mut ba)?)),
            PacketType::UnsubscribeAck => {
                Ok(Self::UnsubscribeAck(UnsubscribeAckPacket::decode(&mut ba)?))
            }
            PacketType::PingRequest => Ok(Self::PingRequest(PingRequestPacket::decode(&mut ba)?)),
            PacketType::PingResponse => Ok(Self::PingResponse(PingResponsePacket::decode(&mut ba)?)),
            PacketType::Disconnect => Ok(Self::Disconnect(DisconnectPacket::decode(&mut ba)?)),
        }
    }

    /// # Errors
    ///
    /// Returns an [`EncodeError`] if a field of the wrapped packet exceeds its on-wire
    /// size limit.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        match self {
            Self::Connect(p) => p.encode(buf),
            Self::ConnectAck(p) => p.encode(buf),
            Self::Publish(p) => p.encode(buf),
            Self::PublishAck(p) => p.encode(buf),
            Self::PublishReceived(p) => p.encode(buf),
            Self::PublishRelease(p) => p.encode(buf),
            Self::PublishComplete(p) => p.encode(buf),
            Self::Subscribe(p) => p.encode(buf),
            Self::SubscribeAck(p) => p.encode(buf),
            Self::Unsubscribe(p) => p.encode(buf),
            Self::UnsubscribeAck(p) => p.encode(buf),
            Self::PingRequest(p) => p.encode(buf),
            Self::PingResponse(p) => p.encode(buf),
            Self::Disconnect(p) => p.encode(buf),
        }
    }
}

macro_rules! impl_from_variant {
    ($variant:ident, $packet:ty) => {
        impl From<$packet> for VariablePacket {
            fn from(p: $packet) -> Self {
                Self::$variant(p)
            }
        }
    };
}

impl_from_variant!(Connect, ConnectPacket);
impl_from_variant!(ConnectAck, ConnectAckPacket);
impl_from_variant!(Publish, PublishPacket);
impl_from_variant!(PublishAck, PublishAckPacket);
impl_from_variant!(PublishReceived, PublishReceivedPacket);
impl_from_variant!(PublishRelease, PublishReleasePacket);
impl_from_variant!(PublishComplete, PublishCompletePacket);
impl_from_variant!(Subscribe, SubscribePacket);
impl_from_variant!(SubscribeAck, SubscribeAckPacket);
impl_from_variant!(Unsubscribe, UnsubscribePacket);
impl_from_variant!(UnsubscribeAck, UnsubscribeAckPacket);
impl_from_variant!(PingRequest, PingRequestPacket);
impl_from_variant!(PingResponse, PingResponsePacket);
impl_from_variant!(Disconnect, DisconnectPacket);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QoS;

    #[test]
    fn dispatches_by_packet_type() {
        let packet: VariablePacket = PingRequestPacket.into();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(VariablePacket::decode(&buf).unwrap(), packet);

        let publish: VariablePacket =
            PublishPacket::new("a/b", QoS::AtMostOnce, None, b"x".to_vec())
                .unwrap()
                .into();
        let mut buf = Vec::new();
        publish.encode(&mut buf).unwrap();
        assert_eq!(VariablePacket::decode(&buf).unwrap(), publish);
    }
}
