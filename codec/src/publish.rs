// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::base::PacketId;
use crate::byte_array::write_string;
use crate::header::{FixedHeader, Packet, PacketType};
use crate::topic::validate_topic_name;
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, QoS};

/// An application message in transit, carried by a PUBLISH packet in either direction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present if and only if `qos != QoS::AtMostOnce`.
    pub packet_id: Option<PacketId>,
    pub payload: Vec<u8>,
}

impl PublishPacket {
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidTopic`] if `topic` contains a wildcard character,
    /// or [`DecodeError::InvalidPacketId`] if `qos` is not `AtMostOnce` and no packet
    /// id was supplied, or `qos` is `AtMostOnce` and one was.
    pub fn new(
        topic: &str,
        qos: QoS,
        packet_id: Option<PacketId>,
        payload: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        validate_topic_name(topic)?;
        match (qos, packet_id) {
            (QoS::AtMostOnce, Some(_)) | (QoS::AtLeastOnce | QoS::ExactlyOnce, None) => {
                return Err(DecodeError::InvalidPacketId)
            }
            _ => {}
        }
        Ok(Self {
            dup: false,
            qos,
            retain: false,
            topic: topic.to_string(),
            packet_id,
            payload,
        })
    }

    /// Set dup/retain and return self. Dup MUST NOT be set on a QoS 0 publish.
    #[must_use]
    pub fn with_flags(mut self, dup: bool, retain: bool) -> Self {
        self.dup = self.qos != QoS::AtMostOnce && dup;
        self.retain = retain;
        self
    }
}

impl Packet for PublishPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Publish {
            dup: self.dup,
            qos: self.qos,
            retain: self.retain,
        }
    }
}

impl DecodePacket for PublishPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let (dup, qos, retain) = match fixed_header.packet_type() {
            PacketType::Publish { dup, qos, retain } => (dup, qos, retain),
            _ => return Err(DecodeError::InvalidPacketType),
        };
        if qos == QoS::AtMostOnce && dup {
            return Err(DecodeError::InvalidPacketFlags);
        }

        let topic = ba.read_string_data()?;
        validate_topic_name(&topic)?;

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(ba.read_u16()?)
        };

        let payload = ba.read_remaining().to_vec();

        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            payload,
        })
    }
}

impl EncodePacket for PublishPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut payload = Vec::new();
        write_string(&mut payload, &self.topic)?;
        if let Some(packet_id) = self.packet_id {
            payload.extend_from_slice(&packet_id.to_be_bytes());
        }
        payload.extend_from_slice(&self.payload);

        let fixed_header = FixedHeader::new(self.packet_type(), payload.len())?;
        let header_len = fixed_header.encode(buf)?;
        buf.extend_from_slice(&payload);
        Ok(header_len + payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_qos0() {
        let packet = PublishPacket::new("a/b", QoS::AtMostOnce, None, b"hi".to_vec()).unwrap();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn roundtrip_qos2_with_dup_retain() {
        let packet = PublishPacket::new("a/b", QoS::ExactlyOnce, Some(42), b"hi".to_vec())
            .unwrap()
            .with_flags(true, true);
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
        assert!(decoded.dup);
        assert!(decoded.retain);
    }

    #[test]
    fn rejects_missing_packet_id_for_qos1() {
        assert!(PublishPacket::new("a/b", QoS::AtLeastOnce, None, vec![]).is_err());
    }

    #[test]
    fn rejects_dup_on_qos0_wire_form() {
        let buf = vec![0x38, 0x05, 0x00, 0x01, b'a', b'x', b'y'];
        let mut ba = ByteArray::new(&buf);
        assert!(matches!(
            PublishPacket::decode(&mut ba),
            Err(DecodeError::InvalidPacketFlags)
        ));
    }
}
