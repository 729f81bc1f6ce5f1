// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use codec::{topic_matches_filter, validate_topic_filter, QoS};

use crate::commands::SessionId;

struct Row {
    session_id: SessionId,
    filter: String,
    max_qos: QoS,
}

/// Flat, linearly-scanned table of `(session_id, topic_filter, max_qos)` rows. The
/// reference broker keeps a per-client map of compiled filters inside a shared trie;
/// this implementation keeps the same logical rows without the trie, matching its
/// approach in spirit rather than its exact data structure.
#[derive(Default)]
pub struct SubscriptionRegistry {
    rows: Vec<Row>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces this session's subscription to each filter, granting
    /// `min(requested, server_cap)` for valid filters and `None` (subscribe failure,
    /// reason code `0x80`) for malformed ones.
    pub fn subscribe(&mut self, session_id: SessionId, filters: &[(String, QoS)], server_cap: QoS) -> Vec<Option<QoS>> {
        filters
            .iter()
            .map(|(filter, requested)| {
                if validate_topic_filter(filter).is_err() {
                    return None;
                }
                let granted = (*requested).min(server_cap);
                self.rows.retain(|r| !(r.session_id == session_id && r.filter == *filter));
                self.rows.push(Row {
                    session_id,
                    filter: filter.clone(),
                    max_qos: granted,
                });
                Some(granted)
            })
            .collect()
    }

    /// Removes this session's subscription to each named filter. Filters the session
    /// never held are silently ignored.
    pub fn unsubscribe(&mut self, session_id: SessionId, filters: &[String]) {
        self.rows
            .retain(|r| !(r.session_id == session_id && filters.iter().any(|f| f == &r.filter)));
    }

    /// Lists every session with at least one filter matching `topic`, each paired with
    /// the maximum granted QoS across its matching filters.
    #[must_use]
    pub fn resolve(&self, topic: &str) -> Vec<(SessionId, QoS)> {
        let mut resolved: Vec<(SessionId, QoS)> = Vec::new();
        for row in &self.rows {
            if !topic_matches_filter(topic, &row.filter) {
                continue;
            }
            if let Some(entry) = resolved.iter_mut().find(|(id, _)| *id == row.session_id) {
                entry.1 = entry.1.max(row.max_qos);
            } else {
                resolved.push((row.session_id, row.max_qos));
            }
        }
        resolved
    }

    /// Drops every row belonging to `session_id`.
    pub fn forget(&mut self, session_id: SessionId) {
        self.rows.retain(|r| r.session_id != session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_the_lesser_of_requested_and_server_cap() {
        let mut registry = SubscriptionRegistry::new();
        let granted = registry.subscribe(1, &[("a/b".to_string(), QoS::ExactlyOnce)], QoS::AtLeastOnce);
        assert_eq!(granted, vec![Some(QoS::AtLeastOnce)]);
    }

    #[test]
    fn rejects_malformed_filters() {
        let mut registry = SubscriptionRegistry::new();
        let granted = registry.subscribe(1, &[("a/+b".to_string(), QoS::AtMostOnce)], QoS::ExactlyOnce);
        assert_eq!(granted, vec![None]);
    }

    #[test]
    fn resolve_uses_the_maximum_qos_across_matching_filters() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(1, &[("a/#".to_string(), QoS::AtMostOnce)], QoS::ExactlyOnce);
        registry.subscribe(1, &[("a/b".to_string(), QoS::ExactlyOnce)], QoS::ExactlyOnce);
        assert_eq!(registry.resolve("a/b"), vec![(1, QoS::ExactlyOnce)]);
    }

    #[test]
    fn unsubscribe_removes_only_the_named_filters() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(1, &[("a/b".to_string(), QoS::AtMostOnce), ("c/d".to_string(), QoS::AtMostOnce)], QoS::ExactlyOnce);
        registry.unsubscribe(1, &["a/b".to_string()]);
        assert_eq!(registry.resolve("a/b"), vec![]);
        assert_eq!(registry.resolve("c/d"), vec![(1, QoS::AtMostOnce)]);
    }

    #[test]
    fn forget_drops_all_rows_for_a_session() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(1, &[("a/b".to_string(), QoS::AtMostOnce)], QoS::ExactlyOnce);
        registry.forget(1);
        assert_eq!(registry.resolve("a/b"), vec![]);
    }
}
