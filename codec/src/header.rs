// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;
use std::fmt;

use crate::var_int::VarInt;
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, QoS};

/// A decoded or to-be-encoded control packet, uniform over all fourteen types.
pub trait Packet: fmt::Debug {
    fn packet_type(&self) -> PacketType;
}

/// The 14 MQTT 3.1.1 control packet types together with their fixed-header flag bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PacketType {
    #[default]
    Connect,
    ConnectAck,
    Publish {
        dup: bool,
        qos: QoS,
        retain: bool,
    },
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits: u8 = match packet_type {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::PublishReceived => 5,
            PacketType::PublishRelease => 6,
            PacketType::PublishComplete => 7,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::Unsubscribe => 10,
            PacketType::UnsubscribeAck => 11,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
        };

        let flag_bits: u8 = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b0000_1000 } else { 0 };
                let qos = (u8::from(qos)) << 1;
                let retain = u8::from(retain);
                dup | qos | retain
            }
            PacketType::PublishRelease | PacketType::Subscribe | PacketType::Unsubscribe => {
                0b0000_0010
            }
            _ => 0,
        };

        (type_bits << 4) | flag_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    /// Parse packet type and validate reserved flag bits.
    ///
    /// Where a flag bit is marked "Reserved", it MUST be set to the value listed in the
    /// spec; a receiver that sees any other value MUST close the network connection
    /// (treated here as `InvalidPacketFlags`).
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0b1111_0000) >> 4;
        let flags = v & 0b0000_1111;

        let reserved_zero = |t: Self| -> Result<Self, Self::Error> {
            if flags == 0 {
                Ok(t)
            } else {
                Err(DecodeError::InvalidPacketFlags)
            }
        };

        match type_bits {
            1 => reserved_zero(Self::Connect),
            2 => reserved_zero(Self::ConnectAck),
            3 => {
                let dup = flags & 0b0000_1000 != 0;
                let retain = flags & 0b0000_0001 != 0;
                let qos = QoS::try_from((flags & 0b0000_0110) >> 1)
                    .map_err(|_e| DecodeError::InvalidPacketFlags)?;
                Ok(Self::Publish { dup, qos, retain })
            }
            4 => reserved_zero(Self::PublishAck),
            5 => reserved_zero(Self::PublishReceived),
            6 => {
                if flags == 0b0000_0010 {
                    Ok(Self::PublishRelease)
                } else {
                    Err(DecodeError::InvalidPacketFlags)
                }
            }
            7 => reserved_zero(Self::PublishComplete),
            8 => {
                if flags == 0b0000_0010 {
                    Ok(Self::Subscribe)
                } else {
                    Err(DecodeError::InvalidPacketFlags)
                }
            }
            9 => reserved_zero(Self::SubscribeAck),
            10 => {
                if flags == 0b0000_0010 {
                    Ok(Self::Unsubscribe)
                } else {
                    Err(DecodeError::InvalidPacketFlags)
                }
            }
            11 => reserved_zero(Self::UnsubscribeAck),
            12 => reserved_zero(Self::PingRequest),
            13 => reserved_zero(Self::PingResponse),
            14 => reserved_zero(Self::Disconnect),
            _ => Err(DecodeError::InvalidPacketType),
        }
    }
}

/// Fixed header common to every control packet.
///
/// ```text
///  7 6 5 4 3 2 1 0
/// +-------+-------+
/// | Type  | Flags |
/// +-------+-------+
/// | Remaining Len |
/// +-------+-------+
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedHeader {
    packet_type: PacketType,
    remaining_length: VarInt,
}

impl FixedHeader {
    /// # Errors
    ///
    /// Returns [`EncodeError::InvalidVarInt`] if `remaining_length` is too large to encode.
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, EncodeError> {
        match VarInt::from_len(remaining_length) {
            Ok(remaining_length) => Ok(Self {
                packet_type,
                remaining_length,
            }),
            Err(e) => Err(e),
        }
    }

    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.remaining_length.value()
    }

    /// Total on-wire length of this header (type+flags byte plus varint bytes).
    #[must_use]
    pub const fn bytes(&self) -> usize {
        1 + self.remaining_length.bytes()
    }
}

impl DecodePacket for FixedHeader {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flag = ba.read_byte()?;
        let packet_type = PacketType::try_from(flag)?;
        let remaining_length = VarInt::decode(ba)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl EncodePacket for FixedHeader {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(self.packet_type.into());
        let n = self.remaining_length.encode(buf)?;
        Ok(1 + n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_ping_response() {
        let mut buf = Vec::new();
        let header = FixedHeader::new(PacketType::PingResponse, 0).unwrap();
        let n = header.encode(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(&buf, &[0xd0, 0x00]);
    }

    #[test]
    fn decode_publish_flags() {
        let buf = [0x3d, 0x00];
        let mut ba = ByteArray::new(&buf);
        let header = FixedHeader::decode(&mut ba).unwrap();
        assert_eq!(
            header.packet_type(),
            PacketType::Publish {
                dup: true,
                qos: QoS::ExactlyOnce,
                retain: true,
            }
        );
    }

    #[test]
    fn decode_rejects_bad_subscribe_flags() {
        let buf = [0x80, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert!(matches!(
            FixedHeader::decode(&mut ba),
            Err(DecodeError::InvalidPacketFlags)
        ));
    }
}
