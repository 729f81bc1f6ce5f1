// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::byte_array::{write_binary, write_string};
use crate::header::{FixedHeader, Packet, PacketType};
use crate::topic::validate_topic_name;
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, ProtocolLevel, QoS};

/// The Last Will and Testament a client registers at connect time, published by the
/// broker on its behalf if the connection is lost without a clean DISCONNECT.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LastWill {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub payload: Vec<u8>,
}

/// The CONNECT packet, sent by a client to open an MQTT session.
///
/// Basic packet structure:
/// ```text
/// +-------------------------+
/// | Fixed header            |
/// +-------------------------+
/// | Protocol name            |
/// | Protocol level           |
/// | Connect flags            |
/// | Keep alive               |
/// +-------------------------+
/// | Client id                |
/// | Will topic (optional)    |
/// | Will payload (optional)  |
/// | Username (optional)      |
/// | Password (optional)      |
/// +-------------------------+
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectPacket {
    pub protocol_level: ProtocolLevel,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub last_will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

impl ConnectPacket {
    /// # Errors
    ///
    /// Returns [`EncodeError::TooManyData`] if the client id exceeds the maximum
    /// length of a `String Data` field.
    pub fn new(client_id: &str) -> Result<Self, EncodeError> {
        if client_id.len() > u16::MAX as usize {
            return Err(EncodeError::TooManyData);
        }
        Ok(Self {
            protocol_level: ProtocolLevel::V311,
            clean_session: true,
            keep_alive: 60,
            client_id: client_id.to_string(),
            last_will: None,
            username: None,
            password: None,
        })
    }
}

impl Packet for ConnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Connect
    }
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Connect {
            return Err(DecodeError::InvalidPacketType);
        }

        let protocol_name = ba.read_string_data()?;
        if protocol_name != "MQTT" {
            return Err(DecodeError::InvalidProtocolName);
        }

        let protocol_level = ProtocolLevel::try_from(ba.read_byte()?)?;

        let connect_flags = ba.read_byte()?;
        if connect_flags & 0b0000_0001 != 0 {
            // Reserved bit MUST be zero.
            return Err(DecodeError::InvalidConnectFlags);
        }
        let clean_session = connect_flags & 0b0000_0010 != 0;
        let will_flag = connect_flags & 0b0000_0100 != 0;
        let will_qos_bits = (connect_flags & 0b0001_1000) >> 3;
        let will_retain = connect_flags & 0b0010_0000 != 0;
        let password_present = connect_flags & 0b0100_0000 != 0;
        let username_present = connect_flags & 0b1000_0000 != 0;

        if !will_flag && (will_qos_bits != 0 || will_retain) {
            return Err(DecodeError::InvalidConnectFlags);
        }
        if password_present && !username_present {
            return Err(DecodeError::InvalidConnectFlags);
        }

        let keep_alive = ba.read_u16()?;
        let client_id = ba.read_string_data()?;

        let last_will = if will_flag {
            let qos = QoS::try_from(will_qos_bits).map_err(|_e| DecodeError::InvalidConnectFlags)?;
            let topic = ba.read_string_data()?;
            validate_topic_name(&topic)?;
            let payload = ba.read_binary_data()?;
            Some(LastWill {
                topic,
                qos,
                retain: will_retain,
                payload,
            })
        } else {
            None
        };

        let username = if username_present {
            Some(ba.read_string_data()?)
        } else {
            None
        };
        let password = if password_present {
            Some(ba.read_binary_data()?)
        } else {
            None
        };

        Ok(Self {
            protocol_level,
            clean_session,
            keep_alive,
            client_id,
            last_will,
            username,
            password,
        })
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut payload = Vec::new();
        write_string(&mut payload, "MQTT")?;
        payload.push(self.protocol_level as u8);

        let mut connect_flags = 0u8;
        if self.clean_session {
            connect_flags |= 0b0000_0010;
        }
        if let Some(will) = &self.last_will {
            connect_flags |= 0b0000_0100;
            connect_flags |= u8::from(will.qos) << 3;
            if will.retain {
                connect_flags |= 0b0010_0000;
            }
        }
        if self.password.is_some() {
            connect_flags |= 0b0100_0000;
        }
        if self.username.is_some() {
            connect_flags |= 0b1000_0000;
        }
        payload.push(connect_flags);

        payload.extend_from_slice(&self.keep_alive.to_be_bytes());
        write_string(&mut payload, &self.client_id)?;

        if let Some(will) = &self.last_will {
            write_string(&mut payload, &will.topic)?;
            write_binary(&mut payload, &will.payload)?;
        }
        if let Some(username) = &self.username {
            write_string(&mut payload, username)?;
        }
        if let Some(password) = &self.password {
            write_binary(&mut payload, password)?;
        }

        let fixed_header = FixedHeader::new(PacketType::Connect, payload.len())?;
        let header_len = fixed_header.encode(buf)?;
        buf.extend_from_slice(&payload);
        Ok(header_len + payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_minimal() {
        let packet = ConnectPacket::new("client-1").unwrap();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn roundtrip_with_will_and_credentials() {
        let mut packet = ConnectPacket::new("client-2").unwrap();
        packet.clean_session = false;
        packet.keep_alive = 30;
        packet.last_will = Some(LastWill {
            topic: "status/client-2".to_string(),
            qos: QoS::AtLeastOnce,
            retain: true,
            payload: b"offline".to_vec(),
        });
        packet.username = Some("alice".to_string());
        packet.password = Some(b"secret".to_vec());

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_password_without_username() {
        let mut packet = ConnectPacket::new("client-3").unwrap();
        packet.password = Some(b"secret".to_vec());
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        // Hand-craft the invalid flag byte: password present, username absent.
        buf[9] &= !0b1000_0000;

        let mut ba = ByteArray::new(&buf);
        assert!(matches!(
            ConnectPacket::decode(&mut ba),
            Err(DecodeError::InvalidConnectFlags)
        ));
    }

    #[test]
    fn rejects_unknown_protocol_name() {
        let buf = vec![
            0x10, 0x09, 0x00, 0x04, b'M', b'Q', b'X', b'X', 0x04, 0x02, 0x00, 0x00,
        ];
        let mut ba = ByteArray::new(&buf);
        assert!(matches!(
            ConnectPacket::decode(&mut ba),
            Err(DecodeError::InvalidProtocolName)
        ));
    }
}
