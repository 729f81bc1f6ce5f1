// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use codec::QoS;
use serde::Deserialize;

use crate::error::{Error, ErrorKind};

/// General section in config: timeouts, flow control and QoS caps that apply to
/// every listener.
#[derive(Debug, Clone, Deserialize)]
pub struct General {
    /// Milliseconds a freshly accepted connection has to send CONNECT before being
    /// dropped.
    #[serde(default = "General::default_connect_timeout_ms")]
    pub(crate) connect_timeout_ms: u64,

    /// Milliseconds to wait for a QoS 1/2 acknowledgement before retransmitting.
    #[serde(default = "General::default_pub_ack_timeout_ms")]
    pub(crate) pub_ack_timeout_ms: u64,

    /// How many times a QoS 1/2 publish is retransmitted before the session is
    /// considered broken.
    #[serde(default = "General::default_pub_max_retries")]
    pub(crate) pub_max_retries: u32,

    /// Maximum number of concurrently in-flight QoS 1/2 publications per session.
    /// Additional publications are queued until one completes.
    #[serde(default = "General::default_max_inflight_messages")]
    pub(crate) max_inflight_messages: usize,

    /// Maximum QoS the broker will ever grant a subscriber, regardless of what it
    /// requests. Must be 0, 1 or 2.
    #[serde(default = "General::default_maximum_qos")]
    pub(crate) maximum_qos: u8,
}

impl General {
    #[must_use]
    pub const fn default_connect_timeout_ms() -> u64 {
        5_000
    }

    #[must_use]
    pub const fn default_pub_ack_timeout_ms() -> u64 {
        10_000
    }

    #[must_use]
    pub const fn default_pub_max_retries() -> u32 {
        3
    }

    #[must_use]
    pub const fn default_max_inflight_messages() -> usize {
        20
    }

    #[must_use]
    pub const fn default_maximum_qos() -> u8 {
        QoS::ExactlyOnce as u8
    }

    #[must_use]
    pub const fn connect_timeout_ms(&self) -> u64 {
        self.connect_timeout_ms
    }

    #[must_use]
    pub const fn pub_ack_timeout_ms(&self) -> u64 {
        self.pub_ack_timeout_ms
    }

    #[must_use]
    pub const fn pub_max_retries(&self) -> u32 {
        self.pub_max_retries
    }

    #[must_use]
    pub const fn max_inflight_messages(&self) -> usize {
        self.max_inflight_messages
    }

    /// # Panics
    ///
    /// Never: `validate` rejects any config whose `maximum_qos` is out of range
    /// before this is ever called.
    #[must_use]
    pub fn maximum_qos(&self) -> QoS {
        QoS::try_from(self.maximum_qos).expect("validated by General::validate")
    }

    /// # Errors
    ///
    /// Returns an error if `max_inflight_messages` is zero, which would make no
    /// publication ever deliverable, or if `maximum_qos` is not 0, 1 or 2.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_inflight_messages == 0 {
            return Err(Error::new(
                ErrorKind::ConfigError,
                "general.max_inflight_messages must be at least 1",
            ));
        }
        if self.maximum_qos > 2 {
            return Err(Error::new(
                ErrorKind::ConfigError,
                "general.maximum_qos must be 0, 1 or 2",
            ));
        }
        Ok(())
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            pub_ack_timeout_ms: Self::default_pub_ack_timeout_ms(),
            pub_max_retries: Self::default_pub_max_retries(),
            max_inflight_messages: Self::default_max_inflight_messages(),
            maximum_qos: Self::default_maximum_qos(),
        }
    }
}
