// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use tokio::sync::mpsc;

use codec::{
    ConnectAckPacket, LastWill, PublishAckPacket, PublishCompletePacket, PublishPacket,
    PublishReceivedPacket, PublishReleasePacket, QoS, SubscribeAckPacket, SubscribePacket,
    UnsubscribeAckPacket, UnsubscribePacket,
};

/// Identifies one connection's logical session, unique for the lifetime of the process.
pub type SessionId = u64;

/// Why a connection is tearing down. Carried from the connection actor to the
/// dispatcher so the dispatcher knows whether to publish the session's last will.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisconnectReason {
    /// Client sent DISCONNECT. Last will MUST NOT be published.
    ClientDisconnect,
    KeepAliveTimeout,
    ConnectTimeout,
    ProtocolViolation,
    NetworkError,
    ServerShutdown,
}

impl DisconnectReason {
    /// Per MQTT-3.1.2-8 / 3.1.2-10, the Will Message is published on every disconnect
    /// except a client-initiated, graceful DISCONNECT.
    #[must_use]
    pub const fn should_publish_will(self) -> bool {
        !matches!(self, Self::ClientDisconnect)
    }
}

/// Messages a connection actor sends to the dispatcher.
#[derive(Debug)]
pub enum SessionToDispatcherCmd {
    Connect {
        session_id: SessionId,
        client_id: String,
        clean_session: bool,
        last_will: Option<LastWill>,
        username: Option<String>,
        sender: mpsc::Sender<DispatcherToSessionCmd>,
    },
    Publish(SessionId, PublishPacket),
    PublishAck(SessionId, PublishAckPacket),
    PublishReceived(SessionId, PublishReceivedPacket),
    PublishRelease(SessionId, PublishReleasePacket),
    PublishComplete(SessionId, PublishCompletePacket),
    Subscribe(SessionId, SubscribePacket),
    Unsubscribe(SessionId, UnsubscribePacket),
    Disconnected(SessionId, DisconnectReason),
    /// Sent once by the server on a shutdown signal. The dispatcher closes every live
    /// session (firing wills, per `DisconnectReason::ServerShutdown`) and then exits
    /// its run loop.
    Shutdown,
}

/// Messages the dispatcher sends back to a connection actor.
#[derive(Debug)]
pub enum DispatcherToSessionCmd {
    ConnectAck(ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(PublishAckPacket),
    PublishReceived(PublishReceivedPacket),
    PublishRelease(PublishReleasePacket),
    PublishComplete(PublishCompletePacket),
    SubscribeAck(SubscribeAckPacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    /// Force-close this connection; carries the reason for the server-side log line.
    Close(DisconnectReason),
}

/// Maximum QoS the broker grants when a subscriber requests a higher one.
#[must_use]
pub const fn capped_qos(requested: QoS, server_max: QoS) -> QoS {
    if (requested as u8) < (server_max as u8) {
        requested
    } else {
        server_max
    }
}
