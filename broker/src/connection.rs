// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::time::Duration;

use codec::{ConnectReturnCode, FrameReader, VariablePacket};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::auth::Authenticator;
use crate::commands::{DisconnectReason, DispatcherToSessionCmd, SessionId, SessionToDispatcherCmd};

/// One accepted TCP connection's lifecycle: `Accepted -> AwaitingConnect -> Connected
/// -> Closing -> Closed`. Owns the socket and drives its own read/write loop; talks to
/// the dispatcher only over `mpsc` channels, never by touching dispatcher state.
pub struct Connection {
    session_id: SessionId,
    socket: TcpStream,
    rbuf_size: usize,
    connect_timeout: Duration,
    to_dispatcher: mpsc::Sender<SessionToDispatcherCmd>,
    authenticator: std::sync::Arc<dyn Authenticator>,
}

impl Connection {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        socket: TcpStream,
        rbuf_size: usize,
        connect_timeout: Duration,
        to_dispatcher: mpsc::Sender<SessionToDispatcherCmd>,
        authenticator: std::sync::Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            session_id,
            socket,
            rbuf_size,
            connect_timeout,
            to_dispatcher,
            authenticator,
        }
    }

    /// Drives this connection until it closes, for any reason.
    pub async fn run(mut self) {
        let remote_ip = self
            .socket
            .peer_addr()
            .map_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0]), |addr| addr.ip());
        let (read_half, mut write_half) = self.socket.split();
        let mut read_half = read_half;
        let mut frame_reader = FrameReader::new();
        let mut buf = vec![0_u8; self.rbuf_size];
        let (from_dispatcher_tx, mut from_dispatcher_rx) = mpsc::channel::<DispatcherToSessionCmd>(32);

        let (client_id, keep_alive_secs) = match await_connect(
            &mut read_half,
            &mut write_half,
            &mut frame_reader,
            &mut buf,
            self.connect_timeout,
            self.authenticator.as_ref(),
            remote_ip,
            self.session_id,
            &self.to_dispatcher,
            from_dispatcher_tx,
        )
        .await
        {
            Some(result) => result,
            None => return,
        };

        info!("session {} ({client_id}) entering Connected state", self.session_id);
        // MQTT-3.1.2-24: the server allows up to 1.5x the advertised keep-alive before
        // treating the connection as dead. `0` disables the timer entirely.
        let keep_alive_period = (keep_alive_secs > 0)
            .then(|| Duration::from_millis(u64::from(keep_alive_secs) * 1500));
        let mut deadline = keep_alive_period.map(|period| Instant::now() + period);

        let reason = loop {
            let keep_alive_wait = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                () = keep_alive_wait => {
                    break DisconnectReason::KeepAliveTimeout;
                }
                read = read_half.read(&mut buf) => {
                    match read {
                        Ok(0) => break DisconnectReason::NetworkError,
                        Ok(n) => {
                            deadline = keep_alive_period.map(|period| Instant::now() + period);
                            frame_reader.extend(&buf[..n]);
                            if let Some(reason) = drain_frames(&mut frame_reader, &mut write_half, &self.to_dispatcher, self.session_id).await {
                                break reason;
                            }
                        }
                        Err(err) => {
                            warn!("session {}: read error: {err}", self.session_id);
                            break DisconnectReason::NetworkError;
                        }
                    }
                }
                cmd = from_dispatcher_rx.recv() => {
                    match cmd {
                        Some(DispatcherToSessionCmd::Close(reason)) => break reason,
                        Some(cmd) => {
                            if let Err(err) = send_packet(&mut write_half, to_variable_packet(cmd)).await {
                                warn!("session {}: write error: {err}", self.session_id);
                                break DisconnectReason::NetworkError;
                            }
                        }
                        None => break DisconnectReason::ServerShutdown,
                    }
                }
            }
        };

        let _ = self
            .to_dispatcher
            .send(SessionToDispatcherCmd::Disconnected(self.session_id, reason))
            .await;
        let _ = write_half.shutdown().await;
    }
}

/// `AwaitingConnect`: the only valid inbound packet is CONNECT. Returns the accepted
/// client id, or `None` if the connection should close (timeout, protocol violation,
/// auth failure, or network error — each case sends its own CONNACK/teardown first).
#[allow(clippy::too_many_arguments)]
async fn await_connect(
    read_half: &mut tokio::net::tcp::ReadHalf<'_>,
    write_half: &mut tokio::net::tcp::WriteHalf<'_>,
    frame_reader: &mut FrameReader,
    buf: &mut [u8],
    connect_timeout: Duration,
    authenticator: &dyn Authenticator,
    remote_ip: std::net::IpAddr,
    session_id: SessionId,
    to_dispatcher: &mpsc::Sender<SessionToDispatcherCmd>,
    from_dispatcher_tx: mpsc::Sender<DispatcherToSessionCmd>,
) -> Option<(String, u16)> {
    let deadline = Instant::now() + connect_timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("session {session_id}: connect timeout");
            return None;
        }

        let read = tokio::time::timeout(remaining, read_half.read(buf)).await;
        let n = match read {
            Ok(Ok(0)) | Err(_) => return None,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => return None,
        };
        frame_reader.extend(&buf[..n]);

        let frame = match frame_reader.parse_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(_) => return None,
        };

        let packet = match VariablePacket::decode(&frame) {
            Ok(packet) => packet,
            Err(_) => return None,
        };

        let VariablePacket::Connect(connect) = packet else {
            return None;
        };

        if connect.protocol_level != codec::ProtocolLevel::V311 {
            let _ = send_connack(write_half, ConnectReturnCode::UnacceptableProtocolVersion).await;
            return None;
        }

        if !authenticator.authenticate(remote_ip, connect.username.as_deref(), connect.password.as_deref()) {
            let _ = send_connack(write_half, ConnectReturnCode::BadUsernameOrPassword).await;
            return None;
        }

        if send_connack(write_half, ConnectReturnCode::Accepted).await.is_err() {
            return None;
        }

        let client_id = connect.client_id.clone();
        let keep_alive = connect.keep_alive;
        if to_dispatcher
            .send(SessionToDispatcherCmd::Connect {
                session_id,
                client_id: client_id.clone(),
                clean_session: connect.clean_session,
                last_will: connect.last_will,
                username: connect.username,
                sender: from_dispatcher_tx,
            })
            .await
            .is_err()
        {
            return None;
        }
        return Some((client_id, keep_alive));
    }
}

async fn send_connack(
    write_half: &mut tokio::net::tcp::WriteHalf<'_>,
    code: ConnectReturnCode,
) -> std::io::Result<()> {
    let ack: VariablePacket = codec::ConnectAckPacket::new(false, code).into();
    send_packet(write_half, ack).await
}

async fn send_packet(write_half: &mut tokio::net::tcp::WriteHalf<'_>, packet: VariablePacket) -> std::io::Result<()> {
    let mut buf = Vec::new();
    packet
        .encode(&mut buf)
        .map_err(|err| std::io::Error::other(format!("{err:?}")))?;
    write_half.write_all(&buf).await
}

/// Decodes every complete frame currently buffered and forwards it to the dispatcher.
/// Returns `Some(reason)` if a frame forces the connection to close.
async fn drain_frames(
    frame_reader: &mut FrameReader,
    write_half: &mut tokio::net::tcp::WriteHalf<'_>,
    to_dispatcher: &mpsc::Sender<SessionToDispatcherCmd>,
    session_id: SessionId,
) -> Option<DisconnectReason> {
    loop {
        let frame = match frame_reader.parse_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(_) => return Some(DisconnectReason::ProtocolViolation),
        };
        let packet = match VariablePacket::decode(&frame) {
            Ok(packet) => packet,
            Err(_) => return Some(DisconnectReason::ProtocolViolation),
        };

        let cmd = match packet {
            VariablePacket::Publish(p) => SessionToDispatcherCmd::Publish(session_id, p),
            VariablePacket::PublishAck(p) => SessionToDispatcherCmd::PublishAck(session_id, p),
            VariablePacket::PublishReceived(p) => SessionToDispatcherCmd::PublishReceived(session_id, p),
            VariablePacket::PublishRelease(p) => SessionToDispatcherCmd::PublishRelease(session_id, p),
            VariablePacket::PublishComplete(p) => SessionToDispatcherCmd::PublishComplete(session_id, p),
            VariablePacket::Subscribe(p) => SessionToDispatcherCmd::Subscribe(session_id, p),
            VariablePacket::Unsubscribe(p) => SessionToDispatcherCmd::Unsubscribe(session_id, p),
            VariablePacket::PingRequest(_) => {
                let pong: VariablePacket = codec::PingResponsePacket.into();
                if send_packet(write_half, pong).await.is_err() {
                    return Some(DisconnectReason::NetworkError);
                }
                continue;
            }
            VariablePacket::Disconnect(_) => return Some(DisconnectReason::ClientDisconnect),
            VariablePacket::Connect(_) => return Some(DisconnectReason::ProtocolViolation),
            _ => return Some(DisconnectReason::ProtocolViolation),
        };
        if to_dispatcher.send(cmd).await.is_err() {
            return Some(DisconnectReason::ServerShutdown);
        }
    }
}

fn to_variable_packet(cmd: DispatcherToSessionCmd) -> VariablePacket {
    match cmd {
        DispatcherToSessionCmd::ConnectAck(p) => p.into(),
        DispatcherToSessionCmd::Publish(p) => p.into(),
        DispatcherToSessionCmd::PublishAck(p) => p.into(),
        DispatcherToSessionCmd::PublishReceived(p) => p.into(),
        DispatcherToSessionCmd::PublishRelease(p) => p.into(),
        DispatcherToSessionCmd::PublishComplete(p) => p.into(),
        DispatcherToSessionCmd::SubscribeAck(p) => p.into(),
        DispatcherToSessionCmd::UnsubscribeAck(p) => p.into(),
        DispatcherToSessionCmd::Close(_) => unreachable!("handled before conversion"),
    }
}
