// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

/// Listener section in config: bind address/port and per-connection buffer sizes.
#[derive(Debug, Clone, Deserialize)]
pub struct Listener {
    #[serde(default = "Listener::default_server_address")]
    pub(crate) server_address: String,

    #[serde(default = "Listener::default_server_port")]
    pub(crate) server_port: u16,

    /// Read buffer size per connection, in bytes.
    #[serde(default = "Listener::default_conn_rbuf_size")]
    pub(crate) conn_rbuf_size: usize,

    /// Write buffer size per connection, in bytes.
    #[serde(default = "Listener::default_conn_wbuf_size")]
    pub(crate) conn_wbuf_size: usize,
}

impl Listener {
    #[must_use]
    pub fn default_server_address() -> String {
        "127.0.0.1".to_string()
    }

    #[must_use]
    pub const fn default_server_port() -> u16 {
        1883
    }

    #[must_use]
    pub const fn default_conn_rbuf_size() -> usize {
        4096
    }

    #[must_use]
    pub const fn default_conn_wbuf_size() -> usize {
        4096
    }

    #[must_use]
    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    #[must_use]
    pub const fn server_port(&self) -> u16 {
        self.server_port
    }

    #[must_use]
    pub const fn conn_rbuf_size(&self) -> usize {
        self.conn_rbuf_size
    }

    #[must_use]
    pub const fn conn_wbuf_size(&self) -> usize {
        self.conn_wbuf_size
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            server_address: Self::default_server_address(),
            server_port: Self::default_server_port(),
            conn_rbuf_size: Self::default_conn_rbuf_size(),
            conn_wbuf_size: Self::default_conn_wbuf_size(),
        }
    }
}
