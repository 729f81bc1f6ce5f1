// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Wire codec for MQTT 3.1.1 control packets: the variable-length remaining-length
//! encoding, a streaming frame reader, and an encoder/decoder for each of the 14
//! packet types.

mod base;
mod byte_array;
mod connack;
mod connect;
mod disconnect;
mod error;
pub mod frame;
mod header;
pub mod packet;
mod pingreq;
mod pingresp;
mod puback;
mod pubcomp;
mod publish;
mod pubrec;
mod pubrel;
mod suback;
mod subscribe;
pub mod topic;
mod unsuback;
mod unsubscribe;
mod var_int;

pub use base::{DecodePacket, EncodePacket, PacketId, ProtocolLevel, QoS};
pub use byte_array::ByteArray;
pub use connack::{ConnectAckPacket, ConnectReturnCode};
pub use connect::{ConnectPacket, LastWill};
pub use disconnect::DisconnectPacket;
pub use error::{DecodeError, EncodeError};
pub use frame::FrameReader;
pub use header::{FixedHeader, Packet, PacketType};
pub use packet::VariablePacket;
pub use pingreq::PingRequestPacket;
pub use pingresp::PingResponsePacket;
pub use puback::PublishAckPacket;
pub use pubcomp::PublishCompletePacket;
pub use publish::PublishPacket;
pub use pubrec::PublishReceivedPacket;
pub use pubrel::PublishReleasePacket;
pub use suback::{SubscribeAck, SubscribeAckPacket};
pub use subscribe::{SubscribePacket, SubscribeTopic};
pub use topic::{topic_matches_filter, validate_topic_filter, validate_topic_name};
pub use unsuback::UnsubscribeAckPacket;
pub use unsubscribe::UnsubscribePacket;
pub use var_int::{VarInt, MAX_REMAINING_LENGTH};
