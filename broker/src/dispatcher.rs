// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::time::Duration;

use codec::{
    ConnectAckPacket, ConnectReturnCode, PublishPacket, QoS, SubscribeAck, SubscribeAckPacket,
    UnsubscribeAckPacket,
};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time;

use crate::commands::{capped_qos, DisconnectReason, DispatcherToSessionCmd, SessionId, SessionToDispatcherCmd};
use crate::inflight::{RetransmitPacket, TxOutcome};
use crate::registry::SubscriptionRegistry;
use crate::retained::RetainedStore;
use crate::session::ClientSession;

/// Configuration the dispatcher needs from `general`, carried in rather than handed a
/// whole `Config` so unit tests can build one without a config file.
#[derive(Clone, Copy)]
pub struct DispatcherConfig {
    pub max_inflight_messages: usize,
    pub pub_ack_timeout: Duration,
    pub pub_max_retries: u32,
    pub maximum_qos: QoS,
}

/// Single owner of the `session_id -> ClientSession` map (C6). Reached only through
/// `SessionToDispatcherCmd` messages on an `mpsc` channel; no lock is taken on session
/// state anywhere, matching the reference broker's actor-per-component design.
pub struct Dispatcher {
    config: DispatcherConfig,
    sessions: Vec<ClientSession>,
    registry: SubscriptionRegistry,
    retained: RetainedStore,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            sessions: Vec::new(),
            registry: SubscriptionRegistry::new(),
            retained: RetainedStore::new(),
        }
    }

    /// Runs the dispatcher loop until `rx` is closed (every `Connection` task and the
    /// acceptor have dropped their sender clones).
    pub async fn run(mut self, mut rx: mpsc::Receiver<SessionToDispatcherCmd>) {
        let mut retransmit_tick = time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(SessionToDispatcherCmd::Shutdown) => {
                            self.on_shutdown().await;
                            break;
                        }
                        Some(cmd) => self.handle(cmd).await,
                        None => break,
                    }
                }
                _ = retransmit_tick.tick() => {
                    self.retransmit_due().await;
                }
            }
        }
    }

    /// Closes every live session, firing each one's will (a shutdown is not a graceful
    /// client DISCONNECT), then drops all dispatcher-owned state.
    async fn on_shutdown(&mut self) {
        let sessions = std::mem::take(&mut self.sessions);
        info!("dispatcher shutting down: closing {} live session(s)", sessions.len());
        for session in sessions {
            let _ = session
                .sender
                .send(DispatcherToSessionCmd::Close(DisconnectReason::ServerShutdown))
                .await;
            if let Some(will) = session.last_will {
                let publish = PublishPacket::new(&will.topic, will.qos, None, will.payload)
                    .expect("CONNECT decoder already validated the will topic")
                    .with_flags(false, will.retain);
                self.route_publish(publish).await;
            }
            self.registry.forget(session.session_id);
        }
    }

    async fn handle(&mut self, cmd: SessionToDispatcherCmd) {
        match cmd {
            SessionToDispatcherCmd::Shutdown => unreachable!("handled in run() before dispatch"),
            SessionToDispatcherCmd::Connect {
                session_id,
                client_id,
                clean_session: _,
                last_will,
                username: _,
                sender,
            } => self.on_connect(session_id, client_id, last_will, sender).await,
            SessionToDispatcherCmd::Publish(session_id, publish) => self.on_publish(session_id, publish).await,
            SessionToDispatcherCmd::PublishAck(session_id, ack) => self.on_puback(session_id, ack.packet_id),
            SessionToDispatcherCmd::PublishReceived(session_id, pubrec) => {
                self.on_pubrec(session_id, pubrec.packet_id).await;
            }
            SessionToDispatcherCmd::PublishRelease(session_id, pubrel) => {
                self.on_pubrel(session_id, pubrel.packet_id);
            }
            SessionToDispatcherCmd::PublishComplete(session_id, pubcomp) => self.on_pubcomp(session_id, pubcomp.packet_id),
            SessionToDispatcherCmd::Subscribe(session_id, subscribe) => self.on_subscribe(session_id, subscribe).await,
            SessionToDispatcherCmd::Unsubscribe(session_id, unsubscribe) => self.on_unsubscribe(session_id, unsubscribe).await,
            SessionToDispatcherCmd::Disconnected(session_id, reason) => self.on_disconnected(session_id, reason).await,
        }
    }

    async fn on_connect(
        &mut self,
        session_id: SessionId,
        client_id: String,
        last_will: Option<codec::LastWill>,
        sender: mpsc::Sender<DispatcherToSessionCmd>,
    ) {
        info!("session {session_id} ({client_id}) connected");
        if let Some(index) = self.sessions.iter().position(|s| s.client_id == client_id) {
            let old = self.sessions.remove(index);
            warn!("session {session_id} ({client_id}): closing stale session {}", old.session_id);
            let _ = old
                .sender
                .send(DispatcherToSessionCmd::Close(DisconnectReason::ClientDisconnect))
                .await;
            self.registry.forget(old.session_id);
        }
        let session = ClientSession::new(
            session_id,
            client_id,
            sender.clone(),
            last_will,
            self.config.max_inflight_messages,
            self.config.pub_ack_timeout,
            self.config.pub_max_retries,
        );
        self.sessions.push(session);
        let _ = sender
            .send(DispatcherToSessionCmd::ConnectAck(ConnectAckPacket::new(
                false,
                ConnectReturnCode::Accepted,
            )))
            .await;
    }

    async fn on_disconnected(&mut self, session_id: SessionId, reason: DisconnectReason) {
        let Some(index) = self.sessions.iter().position(|s| s.session_id == session_id) else {
            return;
        };
        let session = self.sessions.remove(index);
        info!("session {session_id} ({}) disconnected: {reason:?}", session.client_id);
        self.registry.forget(session_id);
        if reason.should_publish_will() {
            if let Some(will) = session.last_will {
                let publish = PublishPacket::new(&will.topic, will.qos, None, will.payload)
                    .expect("CONNECT decoder already validated the will topic")
                    .with_flags(false, will.retain);
                self.route_publish(publish).await;
            }
        }
    }

    async fn on_subscribe(&mut self, session_id: SessionId, subscribe: codec::SubscribePacket) {
        let filters: Vec<(String, QoS)> = subscribe
            .topics
            .iter()
            .map(|t| (t.topic_filter.clone(), t.qos))
            .collect();
        let granted = self.registry.subscribe(session_id, &filters, self.config.maximum_qos);
        let reason_codes = granted
            .iter()
            .map(|qos| match qos {
                Some(qos) => SubscribeAck::QoS(*qos),
                None => SubscribeAck::Failure,
            })
            .collect();

        let mut retained_for_new_subs = Vec::new();
        for (filter, _) in &filters {
            retained_for_new_subs.extend(self.retained.matching(filter));
        }

        let Some(session) = self.sessions.iter().find(|s| s.session_id == session_id) else {
            return;
        };
        let sender = session.sender.clone();
        let _ = sender
            .send(DispatcherToSessionCmd::SubscribeAck(SubscribeAckPacket::new(
                subscribe.packet_id,
                reason_codes,
            )))
            .await;
        for publish in retained_for_new_subs {
            self.deliver_to(session_id, publish).await;
        }
    }

    async fn on_unsubscribe(&mut self, session_id: SessionId, unsubscribe: codec::UnsubscribePacket) {
        self.registry.unsubscribe(session_id, &unsubscribe.topics);
        if let Some(session) = self.sessions.iter().find(|s| s.session_id == session_id) {
            let _ = session
                .sender
                .send(DispatcherToSessionCmd::UnsubscribeAck(UnsubscribeAckPacket::new(
                    unsubscribe.packet_id,
                )))
                .await;
        }
    }

    async fn on_publish(&mut self, session_id: SessionId, publish: PublishPacket) {
        if publish.qos == QoS::ExactlyOnce {
            let Some(packet_id) = publish.packet_id else { return };
            let Some(session) = self.sessions.iter_mut().find(|s| s.session_id == session_id) else {
                return;
            };
            let should_route = session.rx.accept(packet_id);
            let sender = session.sender.clone();
            let _ = sender
                .send(DispatcherToSessionCmd::PublishReceived(codec::PublishReceivedPacket::new(
                    packet_id,
                )))
                .await;
            if !should_route {
                return;
            }
        } else if publish.qos == QoS::AtLeastOnce {
            if let Some(packet_id) = publish.packet_id {
                if let Some(session) = self.sessions.iter().find(|s| s.session_id == session_id) {
                    let _ = session
                        .sender
                        .send(DispatcherToSessionCmd::PublishAck(codec::PublishAckPacket::new(packet_id)))
                        .await;
                }
            }
        }

        if publish.retain {
            self.retained.update(publish.clone());
        }
        self.route_publish(publish).await;
    }

    async fn route_publish(&mut self, publish: PublishPacket) {
        let subscribers = self.registry.resolve(&publish.topic);
        for (session_id, max_qos) in subscribers {
            let mut out = publish.clone();
            out.qos = capped_qos(out.qos, max_qos);
            out.dup = false;
            out.retain = false;
            self.deliver_to(session_id, out).await;
        }
    }

    async fn deliver_to(&mut self, session_id: SessionId, mut publish: PublishPacket) {
        let Some(session) = self.sessions.iter_mut().find(|s| s.session_id == session_id) else {
            return;
        };
        let sender = session.sender.clone();
        if publish.qos == QoS::AtMostOnce {
            publish.packet_id = None;
            let _ = sender.send(DispatcherToSessionCmd::Publish(publish)).await;
            return;
        }
        let packet_id = session.tx.next_id();
        publish.packet_id = Some(packet_id);
        match session.tx.admit(packet_id, publish) {
            TxOutcome::Send(publish) => {
                let _ = sender.send(DispatcherToSessionCmd::Publish(publish)).await;
            }
            TxOutcome::Queued => {}
        }
    }

    fn on_puback(&mut self, session_id: SessionId, packet_id: codec::PacketId) {
        let Some(session) = self.sessions.iter_mut().find(|s| s.session_id == session_id) else {
            return;
        };
        if let Some((next_id, next_publish)) = session.tx.complete(packet_id) {
            let sender = session.sender.clone();
            tokio::spawn(async move {
                let mut publish = next_publish;
                publish.packet_id = Some(next_id);
                let _ = sender.send(DispatcherToSessionCmd::Publish(publish)).await;
            });
        }
    }

    async fn on_pubrec(&mut self, session_id: SessionId, packet_id: codec::PacketId) {
        let Some(session) = self.sessions.iter_mut().find(|s| s.session_id == session_id) else {
            return;
        };
        if !session.tx.received(packet_id) {
            warn!("session {session_id}: PUBREC for unknown packet id {packet_id}");
        }
        let sender = session.sender.clone();
        let _ = sender
            .send(DispatcherToSessionCmd::PublishRelease(codec::PublishReleasePacket::new(packet_id)))
            .await;
    }

    fn on_pubrel(&mut self, session_id: SessionId, packet_id: codec::PacketId) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.session_id == session_id) {
            session.rx.release(packet_id);
        }
    }

    fn on_pubcomp(&mut self, session_id: SessionId, packet_id: codec::PacketId) {
        let Some(session) = self.sessions.iter_mut().find(|s| s.session_id == session_id) else {
            return;
        };
        if let Some((next_id, next_publish)) = session.tx.complete(packet_id) {
            let sender = session.sender.clone();
            tokio::spawn(async move {
                let mut publish = next_publish;
                publish.packet_id = Some(next_id);
                let _ = sender.send(DispatcherToSessionCmd::Publish(publish)).await;
            });
        }
    }

    async fn retransmit_due(&mut self) {
        for session in &mut self.sessions {
            let (retransmits, exhausted) = session.tx.due_for_retransmit();
            for packet in retransmits {
                let cmd = match packet {
                    RetransmitPacket::Publish(publish) => DispatcherToSessionCmd::Publish(publish),
                    RetransmitPacket::PubRel(packet_id) => {
                        DispatcherToSessionCmd::PublishRelease(codec::PublishReleasePacket::new(packet_id))
                    }
                };
                let _ = session.sender.send(cmd).await;
            }
            if !exhausted.is_empty() {
                warn!(
                    "session {} ({}): {} publication(s) exhausted retries",
                    session.session_id,
                    session.client_id,
                    exhausted.len()
                );
            }
        }
    }
}
