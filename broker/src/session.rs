// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::time::Duration;

use codec::LastWill;
use tokio::sync::mpsc;

use crate::commands::{DispatcherToSessionCmd, SessionId};
use crate::inflight::{RxTracker, TxTracker};

/// One authenticated client's server-side state, owned exclusively by the dispatcher
/// task. Created on a successful CONNECT, destroyed on disconnect (see
/// `SPEC_FULL.md` 4.6/9: `clean_session` does not persist sessions across
/// reconnects in this implementation).
pub struct ClientSession {
    pub session_id: SessionId,
    pub client_id: String,
    pub sender: mpsc::Sender<DispatcherToSessionCmd>,
    pub last_will: Option<LastWill>,
    pub tx: TxTracker,
    pub rx: RxTracker,
}

impl ClientSession {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        client_id: String,
        sender: mpsc::Sender<DispatcherToSessionCmd>,
        last_will: Option<LastWill>,
        max_inflight: usize,
        ack_timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            session_id,
            client_id,
            sender,
            last_will,
            tx: TxTracker::new(max_inflight, ack_timeout, max_retries),
            rx: RxTracker::new(),
        }
    }
}
