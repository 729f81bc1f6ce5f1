// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use codec::{PacketId, PublishPacket};

/// State of one outgoing QoS 1/2 publication as seen by the sender.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TxState {
    /// QoS 1: waiting for PUBACK. QoS 2: waiting for PUBREC.
    AwaitingAck,
    /// QoS 2 only: PUBREC received, PUBREL sent, waiting for PUBCOMP.
    AwaitingComplete,
}

struct TxEntry {
    publish: PublishPacket,
    state: TxState,
    attempts: u32,
    deadline: Instant,
}

/// Per-session outbound QoS 1/2 retransmission tracker (C7). Also enforces the
/// `max_inflight` flow-control cap: once `entries` reaches capacity, further
/// publications queue in `pending` until a slot is freed by an ack.
pub struct TxTracker {
    entries: Vec<(PacketId, TxEntry)>,
    pending: VecDeque<PublishPacket>,
    max_inflight: usize,
    ack_timeout: Duration,
    max_retries: u32,
}

/// What the caller should do after `TxTracker::admit` or an ack method runs.
pub enum TxOutcome {
    /// Send this publish now; it has been admitted into the in-flight set.
    Send(PublishPacket),
    /// The cap was already full; the publish has been queued for later.
    Queued,
}

/// One packet due for retransmission. QoS 1/2 entries awaiting the first ack resend
/// the PUBLISH (with DUP set); QoS 2 entries already past PUBREC resend the PUBREL,
/// since that side of the handshake is driven by PUBREL, not PUBLISH.
pub enum RetransmitPacket {
    Publish(PublishPacket),
    PubRel(PacketId),
}

impl TxTracker {
    #[must_use]
    pub fn new(max_inflight: usize, ack_timeout: Duration, max_retries: u32) -> Self {
        Self {
            entries: Vec::new(),
            pending: VecDeque::new(),
            max_inflight,
            ack_timeout,
            max_retries,
        }
    }

    /// Packet id that `admit` would assign next, for building the `PublishPacket`
    /// before handing it to `admit` (QoS 1/2 publishes carry their packet id on the
    /// wire, so it must be known before encoding).
    #[must_use]
    pub fn next_id(&self) -> PacketId {
        next_free_id(&self.entries)
    }

    /// Offers a freshly packet-id'd publish for delivery, honoring the in-flight cap.
    pub fn admit(&mut self, packet_id: PacketId, publish: PublishPacket) -> TxOutcome {
        if self.entries.len() >= self.max_inflight {
            self.pending.push_back(publish);
            return TxOutcome::Queued;
        }
        self.entries.push((
            packet_id,
            TxEntry {
                publish: publish.clone(),
                state: TxState::AwaitingAck,
                attempts: 1,
                deadline: Instant::now() + self.ack_timeout,
            },
        ));
        TxOutcome::Send(publish)
    }

    /// PUBACK for a QoS 1 publish. Returns the next queued publish to admit, if any
    /// slot was freed and anything is pending.
    pub fn complete(&mut self, packet_id: PacketId) -> Option<(PacketId, PublishPacket)> {
        self.entries.retain(|(id, _)| *id != packet_id);
        self.admit_next()
    }

    /// PUBREC for a QoS 2 publish: moves it from `AwaitingAck` to `AwaitingComplete`.
    /// Returns `false` if no such entry exists (unknown packet id).
    pub fn received(&mut self, packet_id: PacketId) -> bool {
        if let Some((_, entry)) = self.entries.iter_mut().find(|(id, _)| *id == packet_id) {
            entry.state = TxState::AwaitingComplete;
            entry.attempts = 1;
            entry.deadline = Instant::now() + self.ack_timeout;
            true
        } else {
            false
        }
    }

    fn admit_next(&mut self) -> Option<(PacketId, PublishPacket)> {
        if self.entries.len() >= self.max_inflight {
            return None;
        }
        self.pending.pop_front().map(|publish| {
            let packet_id = next_free_id(&self.entries);
            match self.admit(packet_id, publish) {
                TxOutcome::Send(p) => (packet_id, p),
                TxOutcome::Queued => unreachable!("just freed a slot"),
            }
        })
    }

    /// Entries whose retransmission deadline has passed. Each call advances attempts
    /// and the deadline; an entry that has exhausted `max_retries` is removed and
    /// returned as the second element of the tuple instead of being due again.
    pub fn due_for_retransmit(&mut self) -> (Vec<RetransmitPacket>, Vec<PacketId>) {
        let now = Instant::now();
        let mut retransmit = Vec::new();
        let mut exhausted = Vec::new();
        self.entries.retain_mut(|(id, entry)| {
            if entry.deadline > now {
                return true;
            }
            if entry.attempts >= self.max_retries {
                exhausted.push(*id);
                return false;
            }
            entry.attempts += 1;
            entry.deadline = now + self.ack_timeout;
            match entry.state {
                TxState::AwaitingAck => {
                    let mut publish = entry.publish.clone();
                    publish.dup = true;
                    retransmit.push(RetransmitPacket::Publish(publish));
                }
                TxState::AwaitingComplete => retransmit.push(RetransmitPacket::PubRel(*id)),
            }
            true
        });
        (retransmit, exhausted)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn next_free_id(entries: &[(PacketId, TxEntry)]) -> PacketId {
    let mut id: PacketId = 1;
    while entries.iter().any(|(existing, _)| *existing == id) {
        id = id.wrapping_add(1);
        if id == 0 {
            id = 1;
        }
    }
    id
}

/// Per-session inbound QoS 2 de-duplication tracker (C8): remembers packet ids that
/// have been PUBLISHed but not yet PUBRELed, so a retransmitted duplicate is not
/// routed twice.
#[derive(Default)]
pub struct RxTracker {
    awaiting_release: HashSet<PacketId>,
}

impl RxTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an inbound QoS 2 PUBLISH. Returns `true` if this is the first time this
    /// packet id has been seen (caller should route it), `false` if it is a duplicate
    /// (caller must still PUBREC it but must not route it again).
    pub fn accept(&mut self, packet_id: PacketId) -> bool {
        self.awaiting_release.insert(packet_id)
    }

    /// PUBREL received: the packet id's delivery cycle is complete.
    pub fn release(&mut self, packet_id: PacketId) {
        self.awaiting_release.remove(&packet_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    fn publish(id: PacketId) -> PublishPacket {
        PublishPacket::new("a/b", QoS::AtLeastOnce, Some(id), b"hi".to_vec()).unwrap()
    }

    #[test]
    fn admits_until_cap_then_queues() {
        let mut tx = TxTracker::new(1, Duration::from_secs(10), 3);
        assert!(matches!(tx.admit(1, publish(1)), TxOutcome::Send(_)));
        assert!(matches!(tx.admit(2, publish(2)), TxOutcome::Queued));
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn completing_an_entry_admits_the_next_queued_one() {
        let mut tx = TxTracker::new(1, Duration::from_secs(10), 3);
        tx.admit(1, publish(1));
        tx.admit(2, publish(2));
        let next = tx.complete(1);
        assert!(next.is_some());
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn awaiting_complete_entries_retransmit_pubrel_not_publish() {
        let mut tx = TxTracker::new(4, Duration::from_millis(0), 3);
        tx.admit(1, publish(1));
        assert!(tx.received(1));
        let (retransmits, exhausted) = tx.due_for_retransmit();
        assert!(exhausted.is_empty());
        assert_eq!(retransmits.len(), 1);
        assert!(matches!(retransmits[0], RetransmitPacket::PubRel(1)));
    }

    #[test]
    fn awaiting_ack_entries_retransmit_publish_with_dup_set() {
        let mut tx = TxTracker::new(4, Duration::from_millis(0), 3);
        tx.admit(1, publish(1));
        let (retransmits, exhausted) = tx.due_for_retransmit();
        assert!(exhausted.is_empty());
        match &retransmits[0] {
            RetransmitPacket::Publish(p) => assert!(p.dup),
            RetransmitPacket::PubRel(_) => panic!("expected a PUBLISH retransmit"),
        }
    }

    #[test]
    fn rx_tracker_flags_duplicates() {
        let mut rx = RxTracker::new();
        assert!(rx.accept(7));
        assert!(!rx.accept(7));
        rx.release(7);
        assert!(rx.accept(7));
    }
}
