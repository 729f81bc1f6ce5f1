// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use clap::Parser;

/// MQTT 3.1.1 broker.
#[derive(Debug, Parser)]
#[command(name = "mqttd", version, about)]
pub struct Cli {
    /// Address to bind the listener on.
    #[arg(long)]
    pub server_address: Option<String>,

    /// Port to bind the listener on.
    #[arg(long)]
    pub server_port: Option<u16>,

    /// Milliseconds a connection has to send CONNECT before being dropped.
    #[arg(long)]
    pub conn_timeout: Option<u64>,

    /// Read buffer size per connection, in bytes.
    #[arg(long)]
    pub conn_rbuf_size: Option<usize>,

    /// Write buffer size per connection, in bytes.
    #[arg(long)]
    pub conn_wbuf_size: Option<usize>,

    /// Milliseconds to wait for a QoS 1/2 acknowledgement before retransmitting.
    #[arg(long)]
    pub pub_ack_timeout: Option<u64>,

    /// How many times a QoS 1/2 publish is retransmitted before giving up.
    #[arg(long)]
    pub pub_max_retries: Option<u32>,

    /// Auth backend: `allow-all` or `file`.
    #[arg(long)]
    pub auth_service_factory: Option<String>,

    /// Path to the rolling log file. Omit to disable file logging.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Minimum level recorded to the log file.
    #[arg(long)]
    pub log_file_level: Option<String>,

    /// Also log to the console.
    #[arg(long)]
    pub log_console: bool,

    /// Minimum level printed to the console.
    #[arg(long)]
    pub log_console_level: Option<String>,

    /// Suppress all logging output.
    #[arg(long)]
    pub log_disable: bool,

    /// Flush every log record synchronously.
    #[arg(long)]
    pub log_sync: bool,

    /// Path to a TOML config file. CLI flags override values it sets.
    #[arg(long)]
    pub conf_file: Option<String>,
}
