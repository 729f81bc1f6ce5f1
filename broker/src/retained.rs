// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::HashMap;

use codec::PublishPacket;

/// Retained-message store, keyed on exact topic string. A publish with a zero-length
/// payload deletes the stored entry instead of retaining an empty one (MQTT 3.3.1-10/11).
#[derive(Default)]
pub struct RetainedStore {
    messages: HashMap<String, PublishPacket>,
}

impl RetainedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a retained publish: stores it, or deletes any existing entry for the
    /// topic if the payload is empty.
    pub fn update(&mut self, publish: PublishPacket) {
        if publish.payload.is_empty() {
            self.messages.remove(&publish.topic);
        } else {
            self.messages.insert(publish.topic.clone(), publish);
        }
    }

    /// Returns every retained message whose topic matches `filter`, for delivery to a
    /// client that has just subscribed.
    #[must_use]
    pub fn matching(&self, filter: &str) -> Vec<PublishPacket> {
        self.messages
            .values()
            .filter(|publish| codec::topic_matches_filter(&publish.topic, filter))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    fn publish(topic: &str, payload: &[u8]) -> PublishPacket {
        PublishPacket::new(topic, QoS::AtMostOnce, None, payload.to_vec())
            .unwrap()
            .with_flags(false, true)
    }

    #[test]
    fn stores_and_resolves_by_filter() {
        let mut store = RetainedStore::new();
        store.update(publish("a/b", b"hello"));
        let found = store.matching("a/+");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].topic, "a/b");
    }

    #[test]
    fn empty_payload_deletes_the_entry() {
        let mut store = RetainedStore::new();
        store.update(publish("a/b", b"hello"));
        store.update(publish("a/b", b""));
        assert!(store.matching("a/b").is_empty());
    }
}
