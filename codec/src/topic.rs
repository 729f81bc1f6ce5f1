// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::error::DecodeError;

/// Validate a topic name (as carried in PUBLISH). Topic names are never allowed to
/// contain wildcard characters, unlike topic filters.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidTopic`] if the name is empty, too long, contains a
/// NUL byte or a wildcard character.
pub fn validate_topic_name(name: &str) -> Result<(), DecodeError> {
    if name.is_empty() || name.len() > u16::MAX as usize {
        return Err(DecodeError::InvalidTopic);
    }
    if name.contains('\u{0000}') || name.contains('+') || name.contains('#') {
        return Err(DecodeError::InvalidTopic);
    }
    Ok(())
}

/// Validate a topic filter (as carried in SUBSCRIBE/UNSUBSCRIBE).
///
/// `#` may only appear alone within its level, and only as the final level.
/// `+` may only appear alone within its level, but may appear at any level.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidTopic`] if the filter violates either rule, is empty,
/// too long, or contains a NUL byte.
pub fn validate_topic_filter(filter: &str) -> Result<(), DecodeError> {
    if filter.is_empty() || filter.len() > u16::MAX as usize {
        return Err(DecodeError::InvalidTopic);
    }
    if filter.contains('\u{0000}') {
        return Err(DecodeError::InvalidTopic);
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (i != last || *level != "#") {
            return Err(DecodeError::InvalidTopic);
        }
        if level.contains('+') && *level != "+" {
            return Err(DecodeError::InvalidTopic);
        }
    }
    Ok(())
}

/// Returns true if `topic` (a concrete topic name published to) matches `filter` (a
/// subscription's topic filter), per the MQTT 3.1.1 topic-matching rules:
///
/// - `#` matches the parent level and every level below it.
/// - `+` matches exactly one level, including an empty level.
/// - Levels are separated by `/`; an empty leading or trailing level is significant.
#[must_use]
pub fn topic_matches_filter(topic: &str, filter: &str) -> bool {
    let mut topic_levels = topic.split('/');
    let mut filter_levels = filter.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some("+"), None) => return false,
            (Some(f), Some(t)) if f == t => {}
            (Some(_), _) => return false,
            (None, None) => return true,
            (None, Some(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_alone_matches_everything() {
        assert!(topic_matches_filter("a/b/c", "#"));
        assert!(topic_matches_filter("", "#"));
    }

    #[test]
    fn trailing_hash_matches_parent_and_descendants() {
        assert!(topic_matches_filter("a/b", "a/b/#"));
        assert!(topic_matches_filter("a/b/c", "a/b/#"));
        assert!(topic_matches_filter("a/b/c/d", "a/b/#"));
        assert!(!topic_matches_filter("a/x", "a/b/#"));
    }

    #[test]
    fn plus_matches_one_level_including_empty() {
        assert!(topic_matches_filter("a/b/c", "a/+/c"));
        assert!(topic_matches_filter("a//c", "a/+/c"));
        assert!(!topic_matches_filter("a/b/x/c", "a/+/c"));
    }

    #[test]
    fn empty_levels_are_significant() {
        assert!(!topic_matches_filter("x", "/x"));
        assert!(topic_matches_filter("/x", "/x"));
    }

    #[test]
    fn dollar_topics_match_leading_wildcards_per_spec() {
        assert!(topic_matches_filter("$SYS/broker/uptime", "#"));
        assert!(topic_matches_filter("$SYS/broker/uptime", "+/broker/uptime"));
        assert!(topic_matches_filter("$SYS/broker/uptime", "$SYS/#"));
    }

    #[test]
    fn filter_validation_rejects_misplaced_wildcards() {
        assert!(validate_topic_filter("a/b/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("a/+/c").is_ok());
        assert!(validate_topic_filter("a/#/c").is_err());
        assert!(validate_topic_filter("a/b#").is_err());
        assert!(validate_topic_filter("a/b+").is_err());
    }

    #[test]
    fn topic_name_rejects_wildcards() {
        assert!(validate_topic_name("a/b/c").is_ok());
        assert!(validate_topic_name("a/+").is_err());
        assert!(validate_topic_name("a/#").is_err());
        assert!(validate_topic_name("").is_err());
    }
}
